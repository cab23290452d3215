//! Read-only projections over open missions: hauling totals and the stack
//! advertisement.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

use crate::mission::Mission;

/// Advertisements are posted with this tag.
pub const ADVERT_PREFIX: &str = "@LFW-WMM ";

const CREDITS_PER_MILLION: u64 = 1_000_000;

/// Number of full-hold trips needed for a haul.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trips {
    /// `ceil(units / capacity)`.
    Estimated(u64),
    /// Capacity is unknown, so no estimate can be made.
    Unbounded,
}

impl Trips {
    /// Estimate trips for `units` with a hold of `capacity`.
    pub fn estimate(units: u64, capacity: u64) -> Self {
        if capacity == 0 {
            Trips::Unbounded
        } else {
            Trips::Estimated(units.div_ceil(capacity))
        }
    }
}

impl fmt::Display for Trips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trips::Estimated(trips) => write!(f, "{trips}"),
            Trips::Unbounded => f.write_str("?"),
        }
    }
}

/// Remaining units of one commodity for one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommodityHaul {
    /// Units still owed.
    pub units: u64,
    /// Trips needed to haul them.
    pub trips: Trips,
}

type Grouped<T> = IndexMap<String, IndexMap<String, IndexMap<String, T>>>;

/// Remaining haul grouped by system → station → commodity.
///
/// Groups keep the order in which they were first seen among open missions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HaulSummary {
    capacity: u64,
    systems: Grouped<CommodityHaul>,
}

impl HaulSummary {
    /// Hold capacity the trip counts were computed with.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The full grouping.
    pub fn systems(&self) -> &IndexMap<String, IndexMap<String, IndexMap<String, CommodityHaul>>> {
        &self.systems
    }

    /// Look up a single commodity total.
    pub fn get(&self, system: &str, station: &str, commodity: &str) -> Option<&CommodityHaul> {
        self.systems.get(system)?.get(station)?.get(commodity)
    }

    /// Unit totals without trip estimates.
    pub fn totals(&self) -> Grouped<u64> {
        self.systems
            .iter()
            .map(|(system, stations)| {
                let stations = stations
                    .iter()
                    .map(|(station, commodities)| {
                        let commodities = commodities
                            .iter()
                            .map(|(commodity, haul)| (commodity.clone(), haul.units))
                            .collect();
                        (station.clone(), commodities)
                    })
                    .collect();
                (system.clone(), stations)
            })
            .collect()
    }

    /// `true` when there is nothing left to haul.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl fmt::Display for HaulSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hauling Summary:")?;
        for (system, stations) in &self.systems {
            writeln!(f, " {system}")?;
            for (station, commodities) in stations {
                writeln!(f, "  {station}")?;
                for (commodity, haul) in commodities {
                    writeln!(f, "   {commodity}: {} [{} trips]", haul.units, haul.trips)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Group the remaining haul of the open missions in `missions`.
pub fn haul_summary<'a>(missions: impl IntoIterator<Item = &'a Mission>, capacity: u64) -> HaulSummary {
    let mut units: Grouped<u64> = IndexMap::new();
    for mission in missions.into_iter().filter(|mission| mission.is_open()) {
        let total = units
            .entry(mission.destination_system.clone())
            .or_default()
            .entry(mission.destination_station.clone())
            .or_default()
            .entry(mission.commodity_localised.clone())
            .or_default();
        *total = total.saturating_add(mission.remaining_haul());
    }

    let systems = units
        .into_iter()
        .map(|(system, stations)| {
            let stations = stations
                .into_iter()
                .map(|(station, commodities)| {
                    let commodities = commodities
                        .into_iter()
                        .map(|(commodity, units)| {
                            let haul = CommodityHaul {
                                units,
                                trips: Trips::estimate(units, capacity),
                            };
                            (commodity, haul)
                        })
                        .collect();
                    (station, commodities)
                })
                .collect();
            (system, stations)
        })
        .collect();

    HaulSummary { capacity, systems }
}

/// Open missions sharing one destination system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStack {
    /// Destination system.
    pub system: String,
    /// Number of missions in the stack.
    pub missions: usize,
    /// Sum of known rewards in credits.
    pub reward_total: u64,
    /// Missions paying five-star reputation.
    pub five_star: usize,
    /// Missions per destination station, in first-seen order.
    pub stations: IndexMap<String, usize>,
}

impl SystemStack {
    fn new(system: String) -> Self {
        Self {
            system,
            missions: 0,
            reward_total: 0,
            five_star: 0,
            stations: IndexMap::new(),
        }
    }

    /// Total reward rounded up to whole millions of credits.
    pub fn profit_millions(&self) -> u64 {
        self.reward_total.div_ceil(CREDITS_PER_MILLION)
    }
}

impl fmt::Display for SystemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stations = self
            .stations
            .iter()
            .map(|(station, count)| format!("{station}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "[{}] [Stack: {}; {}] [Profit: {} M]",
            self.system,
            self.missions,
            stations,
            self.profit_millions()
        )
    }
}

/// Stack advertisement for open missions, one stack per destination system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Advertisement {
    stacks: Vec<SystemStack>,
}

impl Advertisement {
    /// Stacks in first-seen order.
    pub fn stacks(&self) -> &[SystemStack] {
        &self.stacks
    }

    /// Stack for a given system.
    pub fn stack(&self, system: &str) -> Option<&SystemStack> {
        self.stacks.iter().find(|stack| stack.system == system)
    }

    /// `true` when there are no open missions to advertise.
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Write the advertisement text to `path` so it can be pasted elsewhere.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_string())
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stacks.is_empty() {
            return f.write_str("None");
        }
        f.write_str(ADVERT_PREFIX)?;
        for stack in &self.stacks {
            writeln!(f, "{stack}")?;
        }
        Ok(())
    }
}

/// Build the stack advertisement for the open missions in `missions`.
pub fn advertise<'a>(missions: impl IntoIterator<Item = &'a Mission>) -> Advertisement {
    let mut stacks: IndexMap<String, SystemStack> = IndexMap::new();
    for mission in missions.into_iter().filter(|mission| mission.is_open()) {
        let stack = stacks
            .entry(mission.destination_system.clone())
            .or_insert_with(|| SystemStack::new(mission.destination_system.clone()));
        stack.missions += 1;
        stack.reward_total = stack.reward_total.saturating_add(mission.reward.unwrap_or(0));
        if mission.is_five_star() {
            stack.five_star += 1;
        }
        *stack
            .stations
            .entry(mission.destination_station.clone())
            .or_default() += 1;
    }
    Advertisement {
        stacks: stacks.into_values().collect(),
    }
}

/// Advertisement text, or `None` when no missions are open.
pub fn advertisement<'a>(missions: impl IntoIterator<Item = &'a Mission>) -> String {
    advertise(missions).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::tests::{accepted, completed, delivery, event};
    use crate::mission::MissionStore;
    use serde_json::json;

    fn accepted_with_reward(id: u64, system: &str, station: &str, reward: Option<u64>) -> crate::Event {
        let mut record = json!({
            "timestamp": "2024-05-01T12:00:00Z",
            "event": "MissionAccepted",
            "Commodity": "$Gold_Name;",
            "Commodity_Localised": "Gold",
            "Count": 500,
            "DestinationSystem": system,
            "DestinationStation": station,
            "Expiry": "2024-05-08T12:00:00Z",
            "Wing": true,
            "Reputation": "+++++",
            "MissionID": id
        });
        if let Some(reward) = reward {
            record["Reward"] = json!(reward);
        }
        event(record)
    }

    #[test]
    fn groups_remaining_haul_and_estimates_trips() {
        let mut store = MissionStore::new();
        store.apply(accepted(1, "Sol", "Abraham Lincoln", "Tea", 50));
        store.apply(accepted(2, "Sol", "Abraham Lincoln", "Tea", 100));
        store.apply(delivery(2, "2024-05-01T13:00:00Z", 70, 100));

        let summary = haul_summary(store.open_missions(), 16);
        let totals = summary.totals();
        assert_eq!(totals["Sol"]["Abraham Lincoln"]["Tea"], 80);
        assert_eq!(
            summary.get("Sol", "Abraham Lincoln", "Tea"),
            Some(&CommodityHaul {
                units: 80,
                trips: Trips::Estimated(5)
            })
        );
        assert_eq!(
            summary.to_string(),
            "Hauling Summary:\n Sol\n  Abraham Lincoln\n   Tea: 80 [5 trips]\n\n"
        );
    }

    #[test]
    fn grouping_follows_first_seen_order() {
        let mut store = MissionStore::new();
        store.apply(accepted(1, "Wolf 397", "Trophy Camp", "Gold", 10));
        store.apply(accepted(2, "Sol", "Galileo", "Tea", 10));
        store.apply(accepted(3, "Wolf 397", "Brooks Estate", "Silver", 10));
        store.apply(accepted(4, "Wolf 397", "Trophy Camp", "Tea", 10));

        let summary = haul_summary(store.open_missions(), 0);
        let systems: Vec<_> = summary.systems().keys().cloned().collect();
        assert_eq!(systems, vec!["Wolf 397", "Sol"]);
        let stations: Vec<_> = summary.systems()["Wolf 397"].keys().cloned().collect();
        assert_eq!(stations, vec!["Trophy Camp", "Brooks Estate"]);
        let commodities: Vec<_> = summary.systems()["Wolf 397"]["Trophy Camp"]
            .keys()
            .cloned()
            .collect();
        assert_eq!(commodities, vec!["Gold", "Tea"]);
    }

    #[test]
    fn zero_capacity_cannot_estimate_trips() {
        let mut store = MissionStore::new();
        store.apply(accepted(1, "Sol", "Abraham Lincoln", "Tea", 50));
        let summary = haul_summary(store.open_missions(), 0);
        assert_eq!(
            summary.get("Sol", "Abraham Lincoln", "Tea").unwrap().trips,
            Trips::Unbounded
        );
        assert!(summary.to_string().contains("Tea: 50 [? trips]"));
    }

    #[test]
    fn closed_missions_are_left_out() {
        let mut store = MissionStore::new();
        store.apply(accepted(1, "Sol", "Abraham Lincoln", "Tea", 50));
        store.apply(completed(1, "2024-05-02T00:00:00Z"));
        let summary = haul_summary(store.missions(), 16);
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "Hauling Summary:\n");
        assert!(advertise(store.missions()).is_empty());
    }

    #[test]
    fn empty_advertisement_is_none() {
        let store = MissionStore::new();
        assert_eq!(advertisement(store.open_missions()), "None");
    }

    #[test]
    fn profit_rounds_up_to_millions() {
        let mut store = MissionStore::new();
        store.apply(accepted_with_reward(1, "Deciat", "Garay Terminal", Some(2_500_000)));
        let advert = advertise(store.open_missions());
        assert_eq!(advert.stack("Deciat").unwrap().profit_millions(), 3);
        assert_eq!(
            advert.to_string(),
            "@LFW-WMM [Deciat] [Stack: 1; Garay Terminal: 1] [Profit: 3 M]\n"
        );
    }

    #[test]
    fn oversized_values_saturate() {
        let mut store = MissionStore::new();
        store.apply(accepted_with_reward(1, "Deciat", "Garay Terminal", Some(u64::MAX)));
        store.apply(accepted_with_reward(2, "Deciat", "Garay Terminal", Some(5_000_000)));
        store.apply(accepted(3, "Sol", "Galileo", "Tea", u64::MAX));
        store.apply(accepted(4, "Sol", "Galileo", "Tea", 10));

        let advert = advertise(store.open_missions());
        assert_eq!(advert.stack("Deciat").unwrap().reward_total, u64::MAX);
        let summary = haul_summary(store.open_missions(), 16);
        assert_eq!(summary.get("Sol", "Galileo", "Tea").unwrap().units, u64::MAX);
    }

    #[test]
    fn advertisement_counts_stacks_per_system() {
        let mut store = MissionStore::new();
        store.apply(accepted_with_reward(1, "Deciat", "Garay Terminal", Some(40_000_000)));
        store.apply(accepted_with_reward(2, "Deciat", "Smeaton Orbital", None));
        store.apply(accepted_with_reward(3, "Sol", "Galileo", Some(1)));
        store.apply(accepted_with_reward(4, "Deciat", "Garay Terminal", Some(10_000_000)));
        store.apply(accepted(5, "Deciat", "Garay Terminal", "Tea", 10));

        let advert = advertise(store.open_missions());
        let deciat = advert.stack("Deciat").unwrap();
        assert_eq!(deciat.missions, 4);
        assert_eq!(deciat.reward_total, 50_000_000);
        assert_eq!(deciat.five_star, 3);
        assert_eq!(deciat.stations["Garay Terminal"], 3);
        assert_eq!(deciat.stations["Smeaton Orbital"], 1);

        assert_eq!(
            advert.to_string(),
            "@LFW-WMM [Deciat] [Stack: 4; Garay Terminal: 3, Smeaton Orbital: 1] [Profit: 50 M]\n\
             [Sol] [Stack: 1; Galileo: 1] [Profit: 1 M]\n"
        );
    }

    #[test]
    fn exports_advertisement_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("advertisement.txt");

        Advertisement::default().export(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "None");

        let mut store = MissionStore::new();
        store.apply(accepted_with_reward(1, "Deciat", "Garay Terminal", Some(2_500_000)));
        advertise(store.open_missions()).export(&path)?;
        assert_eq!(
            fs::read_to_string(&path)?,
            "@LFW-WMM [Deciat] [Stack: 1; Garay Terminal: 1] [Profit: 3 M]\n"
        );
        Ok(())
    }
}
