use crate::types::{Currency, Direction, RecordKey, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Empty,
    PartiallySelected {
        currency: Option<Currency>,
        direction: Option<Direction>,
    },
    Selected(Selection),
}

/// Tag carried by every in-flight request. A response is applied only while
/// its ticket is still the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    selection: Selection,
    key: RecordKey,
    epoch: u64,
}

impl SelectionTicket {
    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The choice matched what was already selected.
    Unchanged,
    /// One half of the pair is still missing.
    Partial,
    /// A complete, new selection became active.
    Entered(SelectionTicket),
}

#[derive(Debug, Default, Clone)]
pub struct SelectionMachine {
    currency: Option<Currency>,
    direction: Option<Direction>,
    epoch: u64,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SelectionState {
        match (self.currency, self.direction) {
            (None, None) => SelectionState::Empty,
            (Some(currency), Some(direction)) => {
                SelectionState::Selected(Selection::new(currency, direction))
            }
            (currency, direction) => SelectionState::PartiallySelected {
                currency,
                direction,
            },
        }
    }

    pub fn selection(&self) -> Option<Selection> {
        match self.state() {
            SelectionState::Selected(selection) => Some(selection),
            _ => None,
        }
    }

    pub fn choose_currency(&mut self, currency: Currency) -> Transition {
        if self.currency == Some(currency) {
            return Transition::Unchanged;
        }
        self.currency = Some(currency);
        self.enter()
    }

    pub fn choose_direction(&mut self, direction: Direction) -> Transition {
        if self.direction == Some(direction) {
            return Transition::Unchanged;
        }
        self.direction = Some(direction);
        self.enter()
    }

    pub fn current_ticket(&self) -> Option<SelectionTicket> {
        self.selection().map(|selection| SelectionTicket {
            selection,
            key: selection.record_key(),
            epoch: self.epoch,
        })
    }

    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        self.current_ticket().as_ref() == Some(ticket)
    }

    fn enter(&mut self) -> Transition {
        let Some(selection) = self.selection() else {
            return Transition::Partial;
        };
        self.epoch += 1;
        Transition::Entered(SelectionTicket {
            selection,
            key: selection.record_key(),
            epoch: self.epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_empty_partial_selected() {
        let mut machine = SelectionMachine::new();
        assert_eq!(machine.state(), SelectionState::Empty);
        assert!(machine.current_ticket().is_none());

        assert_eq!(machine.choose_direction(Direction::Locking), Transition::Partial);
        assert_eq!(
            machine.state(),
            SelectionState::PartiallySelected {
                currency: None,
                direction: Some(Direction::Locking)
            }
        );

        let Transition::Entered(ticket) = machine.choose_currency(Currency::Btc) else {
            panic!("expected a complete selection");
        };
        assert_eq!(ticket.key().as_str(), "btc-LOCKING");
        assert_eq!(
            machine.state(),
            SelectionState::Selected(Selection::new(Currency::Btc, Direction::Locking))
        );
        assert!(machine.is_current(&ticket));
    }

    #[test]
    fn reselecting_the_same_value_is_a_no_op() {
        let mut machine = SelectionMachine::new();
        machine.choose_currency(Currency::Ltc);
        machine.choose_direction(Direction::Unlocking);
        let ticket = machine.current_ticket().unwrap();
        assert_eq!(machine.choose_currency(Currency::Ltc), Transition::Unchanged);
        assert!(machine.is_current(&ticket));
    }

    #[test]
    fn any_change_invalidates_older_tickets() {
        let mut machine = SelectionMachine::new();
        machine.choose_currency(Currency::Btc);
        let Transition::Entered(first) = machine.choose_direction(Direction::Locking) else {
            panic!("expected a complete selection");
        };
        let Transition::Entered(second) = machine.choose_currency(Currency::Doge) else {
            panic!("expected a new selection");
        };
        assert!(!machine.is_current(&first));
        assert!(machine.is_current(&second));

        // Returning to the first pair still yields a fresh ticket.
        let Transition::Entered(third) = machine.choose_currency(Currency::Btc) else {
            panic!("expected a new selection");
        };
        assert_eq!(third.key(), first.key());
        assert_ne!(third, first);
        assert!(!machine.is_current(&first));
        assert!(third.epoch() > second.epoch());
    }
}
