// Automaton rule variants.
//
// Each rule is a pure function of a cell's current state and the number of
// its eight neighbors that are `Alive`. Five rules are two-state life-likes;
// Brian's Brain is three-state (alive -> dying -> dead) and births on exactly
// two live neighbors. A `Dying` cell left over from Brian's Brain is treated
// as dead by the two-state rules.
//
// | rule        | survive    | birth        |
// |-------------|------------|--------------|
// | conway      | 2, 3       | 3            |
// | highlife    | 2, 3       | 3, 6         |
// | seeds       | never      | 2            |
// | starwars    | 3..=5      | 2            |
// | briansbrain | (-> dying) | 2            |
// | diamoeba    | 5..=8      | 3, 5..=8     |

use crate::types::CellState;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    #[default]
    Conway,
    HighLife,
    Seeds,
    StarWars,
    BriansBrain,
    Diamoeba,
}

impl Rule {
    pub const ALL: [Rule; 6] = [
        Rule::Conway,
        Rule::HighLife,
        Rule::Seeds,
        Rule::StarWars,
        Rule::BriansBrain,
        Rule::Diamoeba,
    ];

    /// Configuration name, as used in JSON.
    pub fn name(self) -> &'static str {
        match self {
            Rule::Conway => "conway",
            Rule::HighLife => "highlife",
            Rule::Seeds => "seeds",
            Rule::StarWars => "starwars",
            Rule::BriansBrain => "briansbrain",
            Rule::Diamoeba => "diamoeba",
        }
    }

    pub fn from_name(name: &str) -> Option<Rule> {
        Rule::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Next state of a cell with `alive_neighbors` live neighbors.
    pub fn next_state(self, current: CellState, alive_neighbors: u8) -> CellState {
        let lives = match (self, current) {
            (Rule::BriansBrain, CellState::Alive) => return CellState::Dying,
            (Rule::BriansBrain, CellState::Dying) => return CellState::Dead,
            (_, CellState::Alive) => self.survives(alive_neighbors),
            _ => self.born(alive_neighbors),
        };
        if lives { CellState::Alive } else { CellState::Dead }
    }

    fn survives(self, n: u8) -> bool {
        match self {
            Rule::Conway | Rule::HighLife => n == 2 || n == 3,
            Rule::Seeds | Rule::BriansBrain => false,
            Rule::StarWars => (3..=5).contains(&n),
            Rule::Diamoeba => (5..=8).contains(&n),
        }
    }

    fn born(self, n: u8) -> bool {
        match self {
            Rule::Conway => n == 3,
            Rule::HighLife => n == 3 || n == 6,
            Rule::Seeds | Rule::StarWars | Rule::BriansBrain => n == 2,
            Rule::Diamoeba => n == 3 || (5..=8).contains(&n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CellState::{Alive, Dead, Dying};

    fn births(rule: Rule) -> Vec<u8> {
        (0..=8).filter(|&n| rule.next_state(Dead, n) == Alive).collect()
    }

    fn survivals(rule: Rule) -> Vec<u8> {
        (0..=8).filter(|&n| rule.next_state(Alive, n) == Alive).collect()
    }

    #[test]
    fn isolated_dead_cell_stays_dead_under_every_rule() {
        for rule in Rule::ALL {
            assert_eq!(rule.next_state(Dead, 0), Dead, "{}", rule.name());
        }
    }

    #[test]
    fn rule_table() {
        assert_eq!(survivals(Rule::Conway), vec![2, 3]);
        assert_eq!(births(Rule::Conway), vec![3]);
        assert_eq!(survivals(Rule::HighLife), vec![2, 3]);
        assert_eq!(births(Rule::HighLife), vec![3, 6]);
        assert!(survivals(Rule::Seeds).is_empty());
        assert_eq!(births(Rule::Seeds), vec![2]);
        assert_eq!(survivals(Rule::StarWars), vec![3, 4, 5]);
        assert_eq!(births(Rule::StarWars), vec![2]);
        assert_eq!(survivals(Rule::Diamoeba), vec![5, 6, 7, 8]);
        assert_eq!(births(Rule::Diamoeba), vec![3, 5, 6, 7, 8]);
        assert_eq!(births(Rule::BriansBrain), vec![2]);
    }

    #[test]
    fn brians_brain_cycles_through_dying() {
        for n in 0..=8 {
            assert_eq!(Rule::BriansBrain.next_state(Alive, n), Dying);
            assert_eq!(Rule::BriansBrain.next_state(Dying, n), Dead);
        }
    }

    #[test]
    fn two_state_rules_treat_dying_as_dead() {
        assert_eq!(Rule::Conway.next_state(Dying, 3), Alive);
        assert_eq!(Rule::Conway.next_state(Dying, 2), Dead);
    }

    #[test]
    fn names_roundtrip() {
        for rule in Rule::ALL {
            assert_eq!(Rule::from_name(rule.name()), Some(rule));
            let json = serde_json::to_string(&rule).unwrap();
            assert_eq!(json, format!("\"{}\"", rule.name()));
        }
        assert_eq!(Rule::from_name("wireworld"), None);
    }
}
