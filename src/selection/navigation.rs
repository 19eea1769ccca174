//! Candidate index computation for navigation steps.
//!
//! Pure functions: the coordinators decide what to do with the candidate.

use crate::config::NavigationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStep {
    Next,
    Previous,
    First,
    Last,
    PageForward,
    PageBackward,
}

/// Where `step` moves a selection of `current` in a catalog of `len` items.
///
/// Returns `None` only for an empty catalog. Only next/previous honour
/// circular navigation; every other step clamps to `[0, len - 1]`.
pub fn candidate(
    current: Option<usize>,
    len: usize,
    step: NavStep,
    config: &NavigationConfig,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let last = len - 1;

    let Some(current) = current.map(|c| c.min(last)) else {
        return Some(match step {
            NavStep::Previous | NavStep::Last => last,
            _ => 0,
        });
    };

    let index = match step {
        NavStep::Next if current == last => {
            if config.circular {
                0
            } else {
                last
            }
        }
        NavStep::Next => current + 1,
        NavStep::Previous if current == 0 => {
            if config.circular {
                last
            } else {
                0
            }
        }
        NavStep::Previous => current - 1,
        NavStep::First => 0,
        NavStep::Last => last,
        NavStep::PageForward => current.saturating_add(config.page_block).min(last),
        NavStep::PageBackward => current.saturating_sub(config.page_block),
    };
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clamped() -> NavigationConfig {
        NavigationConfig {
            circular: false,
            page_block: 10,
        }
    }

    fn circular() -> NavigationConfig {
        NavigationConfig {
            circular: true,
            page_block: 10,
        }
    }

    #[test]
    fn test_empty_catalog_has_no_candidate() {
        for step in [NavStep::Next, NavStep::Last, NavStep::PageBackward] {
            assert_eq!(candidate(None, 0, step, &clamped()), None);
            assert_eq!(candidate(Some(3), 0, step, &circular()), None);
        }
    }

    #[test]
    fn test_next_previous_clamp_or_wrap() {
        assert_eq!(candidate(Some(4), 5, NavStep::Next, &clamped()), Some(4));
        assert_eq!(candidate(Some(4), 5, NavStep::Next, &circular()), Some(0));
        assert_eq!(candidate(Some(0), 5, NavStep::Previous, &clamped()), Some(0));
        assert_eq!(candidate(Some(0), 5, NavStep::Previous, &circular()), Some(4));
        assert_eq!(candidate(Some(2), 5, NavStep::Next, &clamped()), Some(3));
    }

    #[test]
    fn test_first_last_never_wrap() {
        assert_eq!(candidate(Some(2), 5, NavStep::First, &circular()), Some(0));
        assert_eq!(candidate(Some(2), 5, NavStep::Last, &circular()), Some(4));
    }

    #[test]
    fn test_page_steps_clamp() {
        assert_eq!(candidate(Some(3), 5, NavStep::PageForward, &circular()), Some(4));
        assert_eq!(candidate(Some(3), 50, NavStep::PageForward, &clamped()), Some(13));
        assert_eq!(candidate(Some(3), 50, NavStep::PageBackward, &clamped()), Some(0));
        assert_eq!(candidate(Some(30), 50, NavStep::PageBackward, &clamped()), Some(20));
    }

    #[test]
    fn test_from_no_selection() {
        assert_eq!(candidate(None, 5, NavStep::Next, &clamped()), Some(0));
        assert_eq!(candidate(None, 5, NavStep::PageForward, &clamped()), Some(0));
        assert_eq!(candidate(None, 5, NavStep::Previous, &clamped()), Some(4));
        assert_eq!(candidate(None, 5, NavStep::Last, &clamped()), Some(4));
    }

    #[test]
    fn test_stale_current_is_clamped_first() {
        assert_eq!(candidate(Some(9), 5, NavStep::Previous, &clamped()), Some(3));
    }
}
