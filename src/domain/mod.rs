pub mod catalog;
pub mod record;
pub mod scoreboard;
pub mod snapshot;

pub use catalog::ServiceCatalog;
pub use record::{Column, DerivedRecord, RecordFilter, RecordRow};
pub use scoreboard::{
    ChartService, GlobalChart, GlobalChartTeam, GlobalTable, GlobalTeamEntry, TableRound,
    TableService, TeamChart, TeamTable,
};
pub use snapshot::{CheckResult, CheckStatus, Round, ServiceRound, Snapshot, PASS_EXIT_CODE};
