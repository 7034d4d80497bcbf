//! Route table
//!
//! Every endpoint is one [`Route`]: a path pattern, a function turning the
//! path parameters into a [`Query`], the shaping applied to the returned
//! rows and the subject named when nothing matches.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::query::{Query, Relation, Select};

/// Path parameters by name
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone, Copy)]
pub struct Route {
    /// axum path pattern
    pub path: &'static str,
    /// Sample request path printed at startup
    pub example: &'static str,
    pub build: fn(&Params) -> Query,
    pub shape: Shape,
    pub subject: Subject,
}

impl Route {
    pub fn query(&self, params: &Params) -> Query {
        (self.build)(params)
    }

    pub fn not_found(&self, params: &Params) -> String {
        format!("{} does not exist", self.subject.describe(params))
    }
}

/// Post-processing of the rows returned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Forward rows untouched
    Rows,
    /// Replace each row by its embedded `relation`, keeping the first
    /// occurrence per `distinct_by` value
    Unnest {
        relation: &'static str,
        distinct_by: &'static str,
    },
}

impl Shape {
    pub fn apply(&self, rows: Vec<Value>) -> Vec<Value> {
        match *self {
            Shape::Rows => rows,
            Shape::Unnest {
                relation,
                distinct_by,
            } => {
                let mut seen = HashSet::new();
                rows.into_iter()
                    .filter_map(|mut row| row.get_mut(relation).map(Value::take))
                    .filter(|nested| nested.is_object())
                    .filter(|nested| {
                        let key = nested.get(distinct_by).cloned().unwrap_or(Value::Null);
                        seen.insert(key.to_string())
                    })
                    .collect()
            }
        }
    }
}

/// What a not-found response says does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// A whole listing, named by resource
    Resource(&'static str),
    /// The raw value of one parameter
    Param(&'static str),
    /// A parameter value prefixed by a label, e.g. `race 1106`
    Labeled {
        label: &'static str,
        param: &'static str,
    },
    /// `round <round> of season <year>`
    RoundOfSeason,
    /// `<param> between <start> and <end>`
    Between(&'static str),
}

impl Subject {
    pub fn describe(&self, params: &Params) -> String {
        match *self {
            Subject::Resource(name) => name.to_string(),
            Subject::Param(name) => param(params, name).to_string(),
            Subject::Labeled { label, param: name } => {
                format!("{} {}", label, param(params, name))
            }
            Subject::RoundOfSeason => format!(
                "round {} of season {}",
                param(params, "round"),
                param(params, "year")
            ),
            Subject::Between(name) => format!(
                "{} between {} and {}",
                param(params, name),
                param(params, "start"),
                param(params, "end")
            ),
        }
    }
}

fn param<'a>(params: &'a Params, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

const RACE_COLUMNS: &[&str] = &[
    "raceId",
    "year",
    "round",
    "name",
    "date",
    "time",
    "url",
    "fp1_date",
    "fp1_time",
    "fp2_date",
    "fp2_time",
    "fp3_date",
    "fp3_time",
    "quali_date",
    "quali_time",
    "sprint_date",
    "sprint_time",
];

const RESULT_COLUMNS: &[&str] = &[
    "resultId",
    "number",
    "grid",
    "position",
    "positionText",
    "positionOrder",
    "points",
    "laps",
    "time",
    "milliseconds",
    "fastestLap",
    "rank",
    "fastestLapTime",
    "fastestLapSpeed",
    "statusId",
];

const QUALIFYING_COLUMNS: &[&str] = &["qualifyId", "number", "position", "q1", "q2", "q3"];

const DRIVER_EMBED: &[&str] = &["driverRef", "code", "forename", "surname"];
const CONSTRUCTOR_EMBED: &[&str] = &["name", "constructorRef", "nationality"];
const RACE_EMBED: &[&str] = &["name", "round", "year", "date"];

fn drivers() -> Relation {
    Relation::new("drivers", DRIVER_EMBED.iter().copied())
}

fn constructors() -> Relation {
    Relation::new("constructors", CONSTRUCTOR_EMBED.iter().copied())
}

fn races() -> Relation {
    Relation::new("races", RACE_EMBED.iter().copied())
}

fn seasons(_: &Params) -> Query {
    Query::table("seasons")
}

fn circuits(_: &Params) -> Query {
    Query::table("circuits")
}

fn circuit(params: &Params) -> Query {
    Query::table("circuits").eq("circuitRef", param(params, "ref"))
}

fn circuits_in_season(params: &Params) -> Query {
    Query::table("races")
        .select(Select::all().embed(Relation::all("circuits").inner()))
        .eq("year", param(params, "year"))
        .order("round", true)
}

fn constructor_list(_: &Params) -> Query {
    Query::table("constructors")
}

fn constructor(params: &Params) -> Query {
    Query::table("constructors").eq("constructorRef", param(params, "ref"))
}

fn driver_list(_: &Params) -> Query {
    Query::table("drivers")
}

fn driver(params: &Params) -> Query {
    Query::table("drivers").eq("driverRef", param(params, "surname"))
}

fn driver_search(params: &Params) -> Query {
    Query::table("drivers")
        .ilike("driverRef", format!("{}%", param(params, "surname")))
        .order("driverRef", true)
}

fn drivers_in_race(params: &Params) -> Query {
    Query::table("results")
        .select(Select::all().embed(Relation::all("drivers").inner()))
        .eq("raceId", param(params, "raceId"))
        .order("positionOrder", true)
}

fn race(params: &Params) -> Query {
    Query::table("races")
        .select(
            Select::columns(RACE_COLUMNS.iter().copied())
                .embed(Relation::new("circuits", ["name", "location", "country"])),
        )
        .eq("raceId", param(params, "raceId"))
}

fn races_in_season(params: &Params) -> Query {
    Query::table("races")
        .eq("year", param(params, "year"))
        .order("round", true)
}

fn race_in_season(params: &Params) -> Query {
    Query::table("races")
        .eq("year", param(params, "year"))
        .eq("round", param(params, "round"))
}

fn races_at_circuit_select() -> Select {
    Select::columns(["raceId", "year", "round", "name", "date"])
        .embed(Relation::new("circuits", ["circuitRef", "name"]).inner())
}

fn races_at_circuit(params: &Params) -> Query {
    Query::table("races")
        .select(races_at_circuit_select())
        .eq("circuits.circuitRef", param(params, "ref"))
        .order("year", false)
}

fn races_at_circuit_between(params: &Params) -> Query {
    Query::table("races")
        .select(races_at_circuit_select())
        .eq("circuits.circuitRef", param(params, "ref"))
        .gte("year", param(params, "start"))
        .lte("year", param(params, "end"))
        .order("year", false)
}

fn race_results(params: &Params) -> Query {
    Query::table("results")
        .select(
            Select::columns(RESULT_COLUMNS.iter().copied())
                .embed(drivers())
                .embed(races())
                .embed(constructors()),
        )
        .eq("raceId", param(params, "raceId"))
        .order("grid", true)
}

fn driver_results_select() -> Select {
    Select::columns(RESULT_COLUMNS.iter().copied())
        .embed(drivers().inner())
        .embed(races().inner())
        .embed(constructors())
}

fn driver_results(params: &Params) -> Query {
    Query::table("results")
        .select(driver_results_select())
        .eq("drivers.driverRef", param(params, "ref"))
        .order("raceId", true)
}

fn driver_results_between(params: &Params) -> Query {
    Query::table("results")
        .select(driver_results_select())
        .eq("drivers.driverRef", param(params, "ref"))
        .gte("races.year", param(params, "start"))
        .lte("races.year", param(params, "end"))
        .order("raceId", true)
}

fn qualifying(params: &Params) -> Query {
    Query::table("qualifying")
        .select(
            Select::columns(QUALIFYING_COLUMNS.iter().copied())
                .embed(drivers())
                .embed(constructors())
                .embed(Relation::new("races", ["name", "round", "year"])),
        )
        .eq("raceId", param(params, "raceId"))
        .order("position", true)
}

fn driver_standings(params: &Params) -> Query {
    Query::table("driver_standings")
        .select(
            Select::columns([
                "driverStandingsId",
                "raceId",
                "points",
                "position",
                "positionText",
                "wins",
            ])
            .embed(drivers()),
        )
        .eq("raceId", param(params, "raceId"))
        .order("position", true)
}

fn constructor_standings(params: &Params) -> Query {
    Query::table("constructor_standings")
        .select(
            Select::columns([
                "constructorStandingsId",
                "raceId",
                "points",
                "position",
                "positionText",
                "wins",
            ])
            .embed(constructors()),
        )
        .eq("raceId", param(params, "raceId"))
        .order("position", true)
}

const RACE: Subject = Subject::Labeled {
    label: "race",
    param: "raceId",
};

const SEASON: Subject = Subject::Labeled {
    label: "season",
    param: "year",
};

pub static ROUTES: &[Route] = &[
    Route {
        path: "/api/seasons",
        example: "/api/seasons",
        build: seasons,
        shape: Shape::Rows,
        subject: Subject::Resource("seasons"),
    },
    Route {
        path: "/api/circuits",
        example: "/api/circuits",
        build: circuits,
        shape: Shape::Rows,
        subject: Subject::Resource("circuits"),
    },
    Route {
        path: "/api/circuits/:ref",
        example: "/api/circuits/monaco",
        build: circuit,
        shape: Shape::Rows,
        subject: Subject::Param("ref"),
    },
    Route {
        path: "/api/circuits/season/:year",
        example: "/api/circuits/season/2020",
        build: circuits_in_season,
        shape: Shape::Unnest {
            relation: "circuits",
            distinct_by: "circuitId",
        },
        subject: SEASON,
    },
    Route {
        path: "/api/constructors",
        example: "/api/constructors",
        build: constructor_list,
        shape: Shape::Rows,
        subject: Subject::Resource("constructors"),
    },
    Route {
        path: "/api/constructors/:ref",
        example: "/api/constructors/mclaren",
        build: constructor,
        shape: Shape::Rows,
        subject: Subject::Param("ref"),
    },
    Route {
        path: "/api/drivers",
        example: "/api/drivers",
        build: driver_list,
        shape: Shape::Rows,
        subject: Subject::Resource("drivers"),
    },
    Route {
        path: "/api/drivers/:surname",
        example: "/api/drivers/hamilton",
        build: driver,
        shape: Shape::Rows,
        subject: Subject::Param("surname"),
    },
    Route {
        path: "/api/drivers/search/:surname",
        example: "/api/drivers/search/sch",
        build: driver_search,
        shape: Shape::Rows,
        subject: Subject::Param("surname"),
    },
    Route {
        path: "/api/drivers/race/:raceId",
        example: "/api/drivers/race/1106",
        build: drivers_in_race,
        shape: Shape::Unnest {
            relation: "drivers",
            distinct_by: "driverId",
        },
        subject: RACE,
    },
    Route {
        path: "/api/races/:raceId",
        example: "/api/races/19",
        build: race,
        shape: Shape::Rows,
        subject: RACE,
    },
    Route {
        path: "/api/races/season/:year",
        example: "/api/races/season/2020",
        build: races_in_season,
        shape: Shape::Rows,
        subject: SEASON,
    },
    Route {
        path: "/api/races/season/:year/:round",
        example: "/api/races/season/2022/4",
        build: race_in_season,
        shape: Shape::Rows,
        subject: Subject::RoundOfSeason,
    },
    Route {
        path: "/api/races/circuits/:ref",
        example: "/api/races/circuits/monza",
        build: races_at_circuit,
        shape: Shape::Rows,
        subject: Subject::Param("ref"),
    },
    Route {
        path: "/api/races/circuits/:ref/season/:start/:end",
        example: "/api/races/circuits/monza/season/2015/2020",
        build: races_at_circuit_between,
        shape: Shape::Rows,
        subject: Subject::Between("ref"),
    },
    Route {
        path: "/api/results/:raceId",
        example: "/api/results/1106",
        build: race_results,
        shape: Shape::Rows,
        subject: RACE,
    },
    Route {
        path: "/api/results/driver/:ref",
        example: "/api/results/driver/hamilton",
        build: driver_results,
        shape: Shape::Rows,
        subject: Subject::Param("ref"),
    },
    Route {
        path: "/api/results/driver/:ref/seasons/:start/:end",
        example: "/api/results/driver/hamilton/seasons/2019/2021",
        build: driver_results_between,
        shape: Shape::Rows,
        subject: Subject::Between("ref"),
    },
    Route {
        path: "/api/qualifying/:raceId",
        example: "/api/qualifying/1106",
        build: qualifying,
        shape: Shape::Rows,
        subject: RACE,
    },
    Route {
        path: "/api/standings/:raceId/drivers",
        example: "/api/standings/1106/drivers",
        build: driver_standings,
        shape: Shape::Rows,
        subject: RACE,
    },
    Route {
        path: "/api/standings/:raceId/constructors",
        example: "/api/standings/1106/constructors",
        build: constructor_standings,
        shape: Shape::Rows,
        subject: RACE,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Match `path` against an axum pattern, collecting `:name` segments
    fn extract(pattern: &str, path: &str) -> Option<Params> {
        let pattern: Vec<&str> = pattern.split('/').collect();
        let path: Vec<&str> = path.split('/').collect();
        if pattern.len() != path.len() {
            return None;
        }

        let mut params = Params::new();
        for (expected, actual) in pattern.iter().zip(path) {
            match expected.strip_prefix(':') {
                Some(name) => {
                    params.insert(name.to_string(), actual.to_string());
                }
                None if *expected == actual => {}
                None => return None,
            }
        }
        Some(params)
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_paths_are_unique() {
        let mut seen = HashSet::new();
        for route in ROUTES {
            assert!(seen.insert(route.path), "duplicate route {}", route.path);
        }
        assert_eq!(ROUTES.len(), 21);
    }

    #[test]
    fn test_examples_match_their_pattern() {
        for route in ROUTES {
            let params = extract(route.path, route.example)
                .unwrap_or_else(|| panic!("{} does not match {}", route.example, route.path));
            let query = route.query(&params);
            assert!(!query.table.is_empty());
            for filter in &query.filters {
                assert!(
                    !filter.value.is_empty(),
                    "{} builds an empty filter on {}",
                    route.path,
                    filter.column
                );
            }
        }
    }

    #[test]
    fn test_multi_row_lookups_are_ordered() {
        let listings = ["/api/seasons", "/api/circuits", "/api/constructors", "/api/drivers"];
        for route in ROUTES {
            let params = extract(route.path, route.example).unwrap();
            let query = route.query(&params);
            let single_row_lookup = query.filters.iter().any(|f| {
                ["circuitRef", "constructorRef", "driverRef"].contains(&f.column.as_str())
                    && f.op == crate::query::FilterOp::Eq
            }) || route.path == "/api/races/:raceId"
                || route.path == "/api/races/season/:year/:round";
            if listings.contains(&route.path) || single_row_lookup {
                continue;
            }
            assert!(query.order.is_some(), "{} has no order", route.path);
        }
    }

    #[test]
    fn test_single_round_lookup_is_unordered() {
        let query = race_in_season(&params(&[("year", "2020"), ("round", "8")]));
        assert_eq!(query.filters.len(), 2);
        assert!(query.order.is_none());
    }

    #[test]
    fn test_prefix_search_query() {
        let query = driver_search(&params(&[("surname", "sch")]));
        assert_eq!(query.filters[0].column, "driverRef");
        assert_eq!(query.filters[0].value, "sch%");
    }

    #[test]
    fn test_circuit_range_query() {
        let query = races_at_circuit_between(&params(&[
            ("ref", "monza"),
            ("start", "2015"),
            ("end", "2020"),
        ]));
        let encoded = query.to_params();
        assert!(encoded.contains(&("circuits.circuitRef".into(), "eq.monza".into())));
        assert!(encoded.contains(&("year".into(), "gte.2015".into())));
        assert!(encoded.contains(&("year".into(), "lte.2020".into())));
        assert!(encoded.contains(&("order".into(), "year.desc".into())));
    }

    #[test]
    fn test_not_found_messages() {
        let by_path = |path: &str| ROUTES.iter().find(|r| r.path == path).unwrap();

        assert_eq!(
            by_path("/api/circuits/:ref").not_found(&params(&[("ref", "doesnotexist123")])),
            "doesnotexist123 does not exist"
        );
        assert_eq!(
            by_path("/api/races/season/:year/:round")
                .not_found(&params(&[("year", "2022"), ("round", "40")])),
            "round 40 of season 2022 does not exist"
        );
        assert_eq!(
            by_path("/api/races/circuits/:ref/season/:start/:end").not_found(&params(&[
                ("ref", "monza"),
                ("start", "2020"),
                ("end", "2015")
            ])),
            "monza between 2020 and 2015 does not exist"
        );
        assert_eq!(
            by_path("/api/qualifying/:raceId").not_found(&params(&[("raceId", "9999")])),
            "race 9999 does not exist"
        );
        assert_eq!(
            by_path("/api/seasons").not_found(&Params::new()),
            "seasons does not exist"
        );
    }

    #[test]
    fn test_unnest_dedupes_and_skips_nulls() {
        let rows = vec![
            json!({"circuits": {"circuitId": 70, "circuitRef": "red_bull_ring"}}),
            json!({"circuits": {"circuitId": 3, "circuitRef": "bahrain"}}),
            json!({"circuits": {"circuitId": 70, "circuitRef": "red_bull_ring"}}),
            json!({"circuits": null}),
        ];
        let shape = Shape::Unnest {
            relation: "circuits",
            distinct_by: "circuitId",
        };
        let shaped = shape.apply(rows);
        assert_eq!(shaped.len(), 2);
        assert_eq!(shaped[0]["circuitRef"], "red_bull_ring");
        assert_eq!(shaped[1]["circuitRef"], "bahrain");
    }
}
