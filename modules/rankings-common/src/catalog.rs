//! The fixed set of ranked teams. Read-only; ids never change at runtime.

use std::fmt::Write;

use serde::Serialize;

use crate::types::TeamId;

pub const TEAM_COUNT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Team {
    pub id: TeamId,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

macro_rules! team {
    ($id:literal, $name:literal) => {
        Team { id: TeamId($id), name: $name, aliases: &[] }
    };
    ($id:literal, $name:literal, $($alias:literal),+) => {
        Team { id: TeamId($id), name: $name, aliases: &[$($alias),+] }
    };
}

pub static TEAMS: [Team; TEAM_COUNT] = [
    team!(1, "Arizona Cardinals", "Cards"),
    team!(2, "Atlanta Falcons"),
    team!(3, "Baltimore Ravens"),
    team!(4, "Buffalo Bills"),
    team!(5, "Carolina Panthers"),
    team!(6, "Chicago Bears"),
    team!(7, "Cincinnati Bengals"),
    team!(8, "Cleveland Browns"),
    team!(9, "Dallas Cowboys"),
    team!(10, "Denver Broncos"),
    team!(11, "Detroit Lions"),
    team!(12, "Green Bay Packers"),
    team!(13, "Houston Texans"),
    team!(14, "Indianapolis Colts"),
    team!(15, "Jacksonville Jaguars", "Jags"),
    team!(16, "Kansas City Chiefs", "KC"),
    team!(17, "Las Vegas Raiders", "LV"),
    team!(18, "Los Angeles Chargers", "Bolts"),
    team!(19, "Los Angeles Rams"),
    team!(20, "Miami Dolphins"),
    team!(21, "Minnesota Vikings"),
    team!(22, "New England Patriots", "Pats"),
    team!(23, "New Orleans Saints"),
    team!(24, "New York Giants", "G-Men"),
    team!(25, "New York Jets"),
    team!(26, "Philadelphia Eagles", "Birds"),
    team!(27, "Pittsburgh Steelers"),
    team!(28, "San Francisco 49ers", "Niners"),
    team!(29, "Seattle Seahawks"),
    team!(30, "Tampa Bay Buccaneers", "Bucs"),
    team!(31, "Tennessee Titans"),
    team!(32, "Washington Commanders"),
];

pub fn team(id: TeamId) -> &'static Team {
    // TeamId is validated to 1..=32 on construction.
    &TEAMS[usize::from(id.get()) - 1]
}

/// Every team, ordered by name.
pub fn list_teams() -> Vec<&'static Team> {
    let mut teams: Vec<&'static Team> = TEAMS.iter().collect();
    teams.sort_by_key(|t| t.name);
    teams
}

/// Render the catalog as the `id: Name (Alias)` map handed to the extractor.
pub fn map_text() -> String {
    let mut out = String::new();
    for t in TEAMS.iter() {
        let _ = write!(out, "{}: {}", t.id, t.name);
        if !t.aliases.is_empty() {
            let _ = write!(out, " ({})", t.aliases.join(", "));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_ordered() {
        for (i, t) in TEAMS.iter().enumerate() {
            assert_eq!(usize::from(t.id.get()), i + 1);
        }
    }

    #[test]
    fn lookup_by_id() {
        let chiefs = team(TeamId::new(16).unwrap());
        assert_eq!(chiefs.name, "Kansas City Chiefs");
        assert_eq!(chiefs.aliases, &["KC"]);
        assert_eq!(team(TeamId::new(32).unwrap()).name, "Washington Commanders");
    }

    #[test]
    fn list_teams_is_sorted_by_name() {
        let teams = list_teams();
        assert_eq!(teams.len(), TEAM_COUNT);
        assert!(teams.windows(2).all(|w| w[0].name <= w[1].name));
        assert_eq!(teams[0].name, "Arizona Cardinals");
    }

    #[test]
    fn map_text_lists_every_team_with_aliases() {
        let text = map_text();
        assert_eq!(text.lines().count(), TEAM_COUNT);
        assert!(text.starts_with("1: Arizona Cardinals (Cards)\n"));
        assert!(text.contains("\n28: San Francisco 49ers (Niners)\n"));
        assert!(text.ends_with("32: Washington Commanders\n"));
    }
}
