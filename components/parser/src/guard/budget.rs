use std::fmt;

/// Which ceiling of an [`ExpansionBudget`] was hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Limit {
    Indirection,
    Expansion,
}

/// Rejected [`ExpansionBudget::enter_expansion`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LimitExceeded {
    pub limit: Limit,
    /// Byte offset supplied by the caller.
    pub position: usize,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Limit::Indirection => f.write_str("entity indirection limit exceeded"),
            Limit::Expansion => f.write_str("document's entity expansion limit exceeded"),
        }
    }
}

/// Counters of one parse and their ceilings.
///
/// A ceiling of 0 disables that check. Both counters are checked before they
/// are incremented, so they never exceed an enabled ceiling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionBudget {
    depth: usize,
    max_depth: usize,
    expanded_chars: u64,
    max_expanded_chars: u64,
}

impl ExpansionBudget {
    pub fn new(max_depth: usize, max_expanded_chars: u64) -> Self {
        Self {
            depth: 0,
            max_depth,
            expanded_chars: 0,
            max_expanded_chars,
        }
    }

    /// Accounts for entering an entity whose replacement text has
    /// `added_chars` characters.
    ///
    /// The depth ceiling is checked first. On error nothing changes.
    pub fn enter_expansion(&mut self, added_chars: u64, position: usize) -> Result<(), LimitExceeded> {
        if self.max_depth != 0 && self.depth + 1 > self.max_depth {
            return Err(LimitExceeded {
                limit: Limit::Indirection,
                position,
            });
        }

        let expanded_chars = self.expanded_chars.saturating_add(added_chars);
        if self.max_expanded_chars != 0 && expanded_chars > self.max_expanded_chars {
            return Err(LimitExceeded {
                limit: Limit::Expansion,
                position,
            });
        }

        self.depth += 1;
        self.expanded_chars = expanded_chars;
        Ok(())
    }

    /// Leaves the innermost expansion. The expanded character count stays.
    pub fn leave_expansion(&mut self) {
        debug_assert!(self.depth > 0, "leave_expansion without enter_expansion");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Zeroes both counters, ceilings are kept.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.expanded_chars = 0;
    }

    pub fn current_indirection_depth(&self) -> usize {
        self.depth
    }

    pub fn cumulative_expanded_chars(&self) -> u64 {
        self.expanded_chars
    }

    pub fn max_indirection_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_expanded_chars(&self) -> u64 {
        self.max_expanded_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_ceiling_is_inclusive() {
        let mut budget = ExpansionBudget::new(2, 0);
        assert_eq!(Ok(()), budget.enter_expansion(1, 0));
        assert_eq!(Ok(()), budget.enter_expansion(1, 0));
        assert_eq!(
            Err(LimitExceeded {
                limit: Limit::Indirection,
                position: 7
            }),
            budget.enter_expansion(1, 7)
        );
        assert_eq!(2, budget.current_indirection_depth());
        assert_eq!(2, budget.cumulative_expanded_chars());
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let mut budget = ExpansionBudget::new(0, 1024);
        assert_eq!(Ok(()), budget.enter_expansion(1024, 0));
        budget.leave_expansion();
        assert_eq!(Limit::Expansion, budget.enter_expansion(1, 3).unwrap_err().limit);
        assert_eq!(1024, budget.cumulative_expanded_chars());
        assert_eq!(0, budget.current_indirection_depth());
    }

    #[test]
    fn leave_keeps_expanded_chars() {
        let mut budget = ExpansionBudget::new(40, 0);
        for _ in 0..100 {
            budget.enter_expansion(10, 0).unwrap();
            budget.leave_expansion();
        }
        assert_eq!(0, budget.current_indirection_depth());
        assert_eq!(1000, budget.cumulative_expanded_chars());
    }

    #[test]
    fn depth_reported_before_size() {
        let mut budget = ExpansionBudget::new(1, 10);
        budget.enter_expansion(10, 0).unwrap();
        assert_eq!(Limit::Indirection, budget.enter_expansion(1, 0).unwrap_err().limit);
    }

    #[test]
    fn zero_disables() {
        let mut budget = ExpansionBudget::new(0, 0);
        for _ in 0..1000 {
            budget.enter_expansion(u64::MAX / 2, 0).unwrap();
        }
        assert_eq!(1000, budget.current_indirection_depth());
    }

    #[test]
    fn reset_keeps_ceilings() {
        let mut budget = ExpansionBudget::new(3, 30);
        budget.enter_expansion(5, 0).unwrap();
        budget.reset();
        assert_eq!(ExpansionBudget::new(3, 30), budget);
    }
}
