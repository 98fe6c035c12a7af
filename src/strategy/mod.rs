pub mod abbrev;
pub mod edge;
pub mod moneyline_map;
pub mod threshold_map;

pub use abbrev::{abbrev_matches_name, parse_title};
pub use edge::{calculate_edge, calculate_moneyline_edge, has_edge, has_moneyline_edge, max_tradeable_price};
pub use moneyline_map::{MoneylineEntry, MoneylineMap, TeamSide};
pub use threshold_map::{build_threshold_entries, trigger_from_ticker, ThresholdEntry, ThresholdMap};
