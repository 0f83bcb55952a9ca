pub mod derivation;
pub mod report;
pub mod rollup;

pub use derivation::{
    derive_down, derive_records, derive_service_metrics, derive_sla, down_services, rank_series,
    round_passed, score_series, sla_series, team_score_series, DownService, ServiceMetrics,
};
pub use report::{render_markdown, report_file_name, write_report, DowntimeScope, RollupRow};
pub use rollup::{RollupReporter, ServiceRollup, TeamRollup};
