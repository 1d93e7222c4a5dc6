//! Role-graph resolution for user and role descriptions.
//!
//! The principal's own document must exist and parse; anything wrong further down
//! the graph (a dangling reference, a malformed role, a failed read) is recorded as
//! a `Warning` and expansion carries on. Expansion is breadth-first over a visited
//! set so every reachable role is fetched at most once, cycles included.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{AuthzError, AuthzResult};
use crate::model::{Description, Principal, PrivilegeDocument, PrivilegeSet, RoleDocument, Warning};
use crate::names::{NamespaceString, RoleName, UserName};
use crate::state::AuthzManagerExternalState;
use crate::versioning::privilege_document_lookup;

/// Accumulated result of walking the role graph.
#[derive(Debug, Default)]
struct Expansion {
    roles: BTreeSet<RoleName>,
    privileges: PrivilegeSet,
    warnings: Vec<Warning>,
    /// Membership edges seen so far, keyed by the role holding them.
    edges: BTreeMap<RoleName, Vec<RoleName>>,
}

/// Role documents are keyed by `_id: "<db>.<role>"`.
fn role_query(role: &RoleName) -> serde_json::Value {
    json!({ "_id": role.doc_id() })
}

/// Fetch and parse one role document; the error distinguishes "absent" from "broken".
fn fetch_role<S>(state: &S, role: &RoleName) -> AuthzResult<(RoleDocument, Vec<Warning>)>
where
    S: AuthzManagerExternalState + ?Sized,
{
    let doc = state.find_one(&NamespaceString::admin_roles(), &role_query(role))?;
    let (parsed, warnings) = RoleDocument::parse(&doc)?;
    if parsed.name != *role {
        return Err(AuthzError::parse(format!("document {} describes role {}", role.doc_id(), parsed.name)));
    }
    Ok((parsed, warnings))
}

fn expand<S>(state: &S, root: Option<&RoleName>, direct: &[RoleName], acc: &mut Expansion)
where
    S: AuthzManagerExternalState + ?Sized,
{
    let mut visited: HashSet<RoleName> = HashSet::new();
    if let Some(r) = root {
        visited.insert(r.clone());
    }
    let mut frontier: VecDeque<RoleName> = direct.iter().cloned().collect();
    while let Some(role) = frontier.pop_front() {
        if !visited.insert(role.clone()) {
            continue;
        }
        match fetch_role(state, &role) {
            Ok((doc, warnings)) => {
                debug!(target: "authz::resolve", "expanded role {} subroles={} privileges={}", role, doc.roles.len(), doc.privileges.len());
                acc.privileges.add_all(doc.privileges.iter());
                acc.warnings.extend(warnings);
                for sub in doc.roles.iter() {
                    if !visited.contains(sub) {
                        frontier.push_back(sub.clone());
                    }
                }
                acc.edges.insert(role.clone(), doc.roles);
                acc.roles.insert(role);
            }
            Err(AuthzError::NoMatchingDocument { .. }) => acc.warnings.push(Warning::role_not_found(&role)),
            Err(e @ AuthzError::FailedToParse { .. }) => acc.warnings.push(Warning::malformed_role(&role, &e)),
            Err(e) => acc.warnings.push(Warning::storage_error(&role, &e)),
        }
    }
}

/// One warning per role that closes a cycle, found by depth-first search over the
/// recorded edges. Shared sub-roles reached by two paths are not cycles.
fn cycle_warnings(starts: &[RoleName], edges: &BTreeMap<RoleName, Vec<RoleName>>) -> Vec<Warning> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Done,
    }
    let mut marks: BTreeMap<&RoleName, Mark> = BTreeMap::new();
    let mut reported: BTreeSet<&RoleName> = BTreeSet::new();
    let mut out = Vec::new();

    for start in starts {
        if marks.contains_key(start) {
            continue;
        }
        // Explicit stack of (node, next child index) keeps deep graphs off the call stack
        let mut stack: Vec<(&RoleName, usize)> = vec![(start, 0)];
        marks.insert(start, Mark::Open);
        while let Some((node, idx)) = stack.pop() {
            let children = edges.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
            let Some(child) = children.get(idx) else {
                marks.insert(node, Mark::Done);
                continue;
            };
            stack.push((node, idx + 1));
            match marks.get(child) {
                Some(Mark::Open) => {
                    if reported.insert(child) {
                        out.push(Warning::role_cycle(child));
                    }
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Open);
                    stack.push((child, 0));
                }
            }
        }
    }
    out
}

fn log_outcome(desc: &Description) {
    if desc.warnings.is_empty() {
        debug!(target: "authz::resolve", "described {} roles={} privileges={}", desc.principal.full_name(), desc.roles.len(), desc.privileges.len());
    } else {
        warn!(
            target: "authz::resolve",
            "described {} with {} warning(s): {}",
            desc.principal.full_name(),
            desc.warnings.len(),
            desc.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>().join("; ")
        );
    }
}

/// Fully expanded description of `user` under the active schema version.
pub fn describe_user<S>(state: &S, user: &UserName) -> AuthzResult<Description>
where
    S: AuthzManagerExternalState + ?Sized,
{
    let version = state.active_schema_version()?;
    let (ns, query) = privilege_document_lookup(user, version)?;
    let raw = match state.find_one(&ns, &query) {
        Ok(d) => d,
        Err(e) if e.is_not_found() => return Err(AuthzError::user_not_found(format!("Could not find user {}", user))),
        Err(e) => return Err(e),
    };
    let (doc, parse_warnings) = PrivilegeDocument::parse(&raw, version, user.db())?;

    let mut acc = Expansion::default();
    acc.warnings.extend(parse_warnings);
    if doc.credentials.is_none() && doc.expects_credentials() {
        acc.warnings.push(Warning::missing_credentials(user));
    }
    acc.privileges.add_all(doc.privileges.iter());
    expand(state, None, &doc.roles, &mut acc);
    let cycles = cycle_warnings(&doc.roles, &acc.edges);
    acc.warnings.extend(cycles);

    let desc = Description {
        principal: Principal::User(user.clone()),
        credentials: doc.credentials,
        direct_roles: doc.roles,
        roles: acc.roles,
        privileges: acc.privileges,
        warnings: acc.warnings,
    };
    log_outcome(&desc);
    Ok(desc)
}

/// Fully expanded description of `role`. The role itself is not part of its own role set.
pub fn describe_role<S>(state: &S, role: &RoleName) -> AuthzResult<Description>
where
    S: AuthzManagerExternalState + ?Sized,
{
    let (doc, parse_warnings) = match fetch_role(state, role) {
        Ok(v) => v,
        Err(e) if e.is_not_found() => return Err(AuthzError::role_not_found(format!("Could not find role {}", role))),
        Err(e) => return Err(e),
    };

    let mut acc = Expansion::default();
    acc.warnings.extend(parse_warnings);
    acc.privileges.add_all(doc.privileges.iter());
    expand(state, Some(role), &doc.roles, &mut acc);
    acc.edges.insert(role.clone(), doc.roles.clone());
    let cycles = cycle_warnings(std::slice::from_ref(role), &acc.edges);
    acc.warnings.extend(cycles);

    let desc = Description {
        principal: Principal::Role(role.clone()),
        credentials: None,
        direct_roles: doc.roles,
        roles: acc.roles,
        privileges: acc.privileges,
        warnings: acc.warnings,
    };
    log_outcome(&desc);
    Ok(desc)
}
