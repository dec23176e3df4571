// weather_monitor - Weather poller with running temperature extremes
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_LOCATIONS: &[(&str, &str)] = &[
    ("US", "New York"),
    ("US", "Los Angeles"),
    ("UK", "London"),
    ("UK", "Manchester"),
    ("FR", "Paris"),
    ("FR", "Lyon"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("invalid location '{0}', expected COUNTRY/City")]
    Format(String),
}

/// A single (country, city) pair to poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
}

impl Location {
    pub fn new<C: Into<String>, T: Into<String>>(country: C, city: T) -> Self {
        Location {
            country: country.into(),
            city: city.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country, self.city)
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (country, city) = s.split_once('/').ok_or_else(|| LocationError::Format(s.to_owned()))?;
        let (country, city) = (country.trim(), city.trim());
        if country.is_empty() || city.is_empty() {
            return Err(LocationError::Format(s.to_owned()));
        }

        Ok(Location::new(country, city))
    }
}

/// Immutable, ordered set of locations polled on every pass.
///
/// Cloning is cheap, the underlying list is shared. Duplicates are dropped on
/// construction, keeping the position of the first occurrence.
#[derive(Debug, Clone)]
pub struct Locations {
    entries: Arc<[Location]>,
}

impl Locations {
    pub fn new<I: IntoIterator<Item = Location>>(locations: I) -> Self {
        let mut entries: Vec<Location> = Vec::new();
        for loc in locations {
            if !entries.contains(&loc) {
                entries.push(loc);
            }
        }

        Locations { entries: entries.into() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Locations {
    fn default() -> Self {
        Locations::new(DEFAULT_LOCATIONS.iter().map(|(country, city)| Location::new(*country, *city)))
    }
}

#[cfg(test)]
mod test {
    use super::{Location, LocationError, Locations};

    #[test]
    fn test_parse_location() {
        let loc: Location = "FR/Paris".parse().unwrap();
        assert_eq!(Location::new("FR", "Paris"), loc);

        let loc: Location = " US / New York ".parse().unwrap();
        assert_eq!(Location::new("US", "New York"), loc);
    }

    #[test]
    fn test_parse_location_invalid() {
        assert_eq!(
            Err(LocationError::Format("Paris".to_owned())),
            "Paris".parse::<Location>()
        );
        assert!("/Paris".parse::<Location>().is_err());
        assert!("FR/ ".parse::<Location>().is_err());
    }

    #[test]
    fn test_locations_default_order() {
        let locations = Locations::default();
        let names: Vec<String> = locations.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            vec!["US/New York", "US/Los Angeles", "UK/London", "UK/Manchester", "FR/Paris", "FR/Lyon"],
            names
        );
    }

    #[test]
    fn test_locations_deduplicated() {
        let locations = Locations::new(vec![
            Location::new("FR", "Paris"),
            Location::new("UK", "London"),
            Location::new("FR", "Paris"),
        ]);

        assert_eq!(2, locations.len());
        assert_eq!(Some(&Location::new("UK", "London")), locations.iter().nth(1));
    }
}
