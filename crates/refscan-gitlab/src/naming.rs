//! Display naming of merge request heads.
//!
//! The suffix keeps merged and unmerged builds of the same merge request
//! distinct when both are enabled; it must be applied identically on every
//! scan so job identity is stable across rescans.

use crate::observer::BuildFlags;

/// The display name for one (number, merge, fork) combination, or `None`
/// when the flags disable that combination entirely.
pub fn display_name(number: u64, merge: bool, fork: bool, flags: &BuildFlags) -> Option<String> {
    let mut name = format!("PR-{}", number);
    if merge && fork {
        if !flags.fork_mr_merge {
            return None;
        }
        if flags.fork_mr_head {
            name.push_str("-merge");
        }
        // If we only build merged, or only unmerged, the bare PR-<n> scheme
        // is kept.
    }
    if merge && !fork {
        if !flags.origin_mr_merge {
            return None;
        }
        // keyed off the fork flag on purpose, so the disambiguation signal
        // is the same for both categories
        if flags.fork_mr_head {
            name.push_str("-merge");
        }
    }
    if !merge && fork {
        if !flags.fork_mr_head {
            return None;
        }
        if flags.fork_mr_merge {
            name.push_str("-head");
        }
    }
    if !merge && !fork {
        if !flags.origin_mr_head {
            return None;
        }
        if flags.origin_mr_merge {
            name.push_str("-head");
        }
    }
    Some(name)
}
