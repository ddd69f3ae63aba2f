mod rolling_metric;
mod top_talkers;

pub use rolling_metric::{RollingMetric, RollingSummary, DEFAULT_WINDOW};
pub use top_talkers::{ClientRate, RouteRate, RouteTraffic, TopTalkers, TOP_CLIENTS, TOP_ROUTES};
