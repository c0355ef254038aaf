//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Role-based predicates evaluated against the signed-in profile.
//!
//! Every predicate takes the caller's profile as an `Option`; an absent
//! profile (unauthenticated) never grants anything.

use crate::profile::Profile;
use crate::role::Role;

/// True iff the caller's tier is at or above `required`.
pub fn has_permission(caller: Option<&Profile>, required: Role) -> bool {
    caller.is_some_and(|profile| profile.role.satisfies(required))
}

/// Directors and deputy directors manage every department; supervisors and
/// team leads only their assigned ones.
pub fn can_manage_department(caller: Option<&Profile>, department: &str) -> bool {
    let Some(profile) = caller else {
        return false;
    };
    match profile.role {
        Role::Director | Role::DeputyDirector => true,
        Role::Supervisor => contains(&profile.supervised_departments, department),
        Role::TeamLead => contains(&profile.managed_departments, department),
        Role::Agent => false,
    }
}

/// A caller may manage another user only from a strictly higher tier, and
/// never themselves.
pub fn can_manage_user(caller: Option<&Profile>, target_id: &str, target_role: Role) -> bool {
    match caller {
        Some(profile) if profile.id != target_id => profile.role.outranks(target_role),
        _ => false,
    }
}

fn contains(departments: &[String], department: &str) -> bool {
    departments.iter().any(|assigned| assigned == department)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fwm_remote::Identity;

    fn profile(id: &str, role: Role) -> Profile {
        let mut profile = Profile::default_for(&Identity::new(id, format!("{id}@factory.test")), Utc::now());
        profile.role = role;
        profile.needs_setup = false;
        profile
    }

    #[test]
    fn permission_is_monotonic_in_tier() {
        for caller in Role::all() {
            let me = profile("caller", caller);
            for required in Role::all() {
                assert_eq!(
                    has_permission(Some(&me), required),
                    caller.level() >= required.level(),
                    "{caller} vs {required}"
                );
            }
        }
        for required in Role::all() {
            assert!(!has_permission(None, required));
        }
    }

    #[test]
    fn distinct_tiers_are_antisymmetric() {
        for a in Role::all() {
            for b in Role::all().filter(|b| *b != a) {
                let pa = profile("a", a);
                let pb = profile("b", b);
                assert_ne!(
                    has_permission(Some(&pa), b),
                    has_permission(Some(&pb), a),
                    "{a} / {b}"
                );
            }
        }
    }

    #[test]
    fn self_management_is_never_allowed() {
        for role in Role::all() {
            let me = profile("u-1", role);
            for target in Role::all() {
                assert!(!can_manage_user(Some(&me), "u-1", target));
            }
        }
    }

    #[test]
    fn director_manages_every_lower_tier_only() {
        let director = profile("boss", Role::Director);
        for target in Role::all() {
            assert_eq!(
                can_manage_user(Some(&director), "someone-else", target),
                target != Role::Director
            );
        }
        assert!(!can_manage_user(None, "someone-else", Role::Agent));
    }

    #[test]
    fn supervisor_departments_follow_assignment() {
        let mut supervisor = profile("sup", Role::Supervisor);
        assert!(!can_manage_department(Some(&supervisor), "assembly"));

        supervisor.supervised_departments = vec!["assembly".into(), "paint".into()];
        assert!(can_manage_department(Some(&supervisor), "assembly"));
        assert!(!can_manage_department(Some(&supervisor), "welding"));

        // Managed departments belong to team leads, not supervisors.
        supervisor.supervised_departments.clear();
        supervisor.managed_departments = vec!["assembly".into()];
        assert!(!can_manage_department(Some(&supervisor), "assembly"));
    }

    #[test]
    fn departments_for_other_tiers() {
        let mut lead = profile("lead", Role::TeamLead);
        lead.managed_departments = vec!["welding".into()];
        assert!(can_manage_department(Some(&lead), "welding"));
        assert!(!can_manage_department(Some(&lead), "paint"));

        assert!(can_manage_department(Some(&profile("d", Role::Director)), "paint"));
        assert!(can_manage_department(Some(&profile("dd", Role::DeputyDirector)), "paint"));
        assert!(!can_manage_department(Some(&profile("a", Role::Agent)), "paint"));
        assert!(!can_manage_department(None, "paint"));
    }
}
