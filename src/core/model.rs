// Static description of one main/archive table pair. New table pair means
// adding one of these, not editing the archive or delete engines.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub main_table: &'static str,
    pub archive_table: &'static str,
    // Fixed-width YYYYMMDDHHMMSS, lexicographically orderable.
    pub time_column: &'static str,
    // Single-column (transactions' GUID) checked as a flat set; multi-column
    // (activities' ActivityID+PostedTime) checked as a set of tuples.
    pub duplicate_key: &'static [&'static str],
    // Orders "oldest N" for bounded archive/delete.
    pub ordering_key: &'static str,
    // Explicit column list copied main -> archive on ARCHIVE, not `SELECT *`,
    // so order always matches the INSERT list.
    pub columns: &'static [&'static str],
}

impl TableDef {
    pub fn is_single_guid_keyed(&self) -> bool {
        self.duplicate_key.len() == 1 && self.duplicate_key[0] == "GUID"
    }
}

pub const ACTIVITIES: TableDef = TableDef {
    main_table: "dsiactivities",
    archive_table: "dsiactivitiesarchive",
    time_column: "PostedTime",
    duplicate_key: &["ActivityID", "PostedTime"],
    ordering_key: "ActivityID",
    columns: &[
        "ActivityID",
        "ActivityType",
        "TrackingID",
        "SecondaryTrackingID",
        "AgentName",
        "ThreadID",
        "Description",
        "PostedTime",
        "PostedTimeUTC",
        "LineNumber",
        "FileName",
        "MethodName",
        "ServerName",
        "InstanceID",
        "IdenticalAlertCount",
        "AlertLevel",
        "DismissedBy",
        "DismissedDateTime",
        "LastIdenticalAlertDateTime",
        "EventID",
        "DefaultDescription",
        "ExceptionMessage",
    ],
};

pub const TRANSACTIONS: TableDef = TableDef {
    main_table: "dsitransactionlog",
    archive_table: "dsitransactionlogarchive",
    time_column: "WhenReceived",
    duplicate_key: &["GUID"],
    ordering_key: "GUID",
    columns: &[
        "RecordStatus",
        "ProcessMethod",
        "TransactionType",
        "ServerName",
        "DeviceID",
        "UserID",
        "DeviceLocalTime",
        "DeviceUTCTime",
        "DeviceSequenceID",
        "WhenReceived",
        "WhenProcessed",
        "WhenExtracted",
        "ElapsedTime",
        "AppID",
        "AppVersion",
        "AppItemID",
        "WorldHostID",
        "ConnectorID",
        "FunctionDefVersion",
        "FunctionCallID",
        "FunctionCallRC",
        "DataIn",
        "DataOut",
        "ErrorsOut",
        "SecurityID",
        "GUID",
        "UnitID",
        "PromotionLevelID",
        "EnvironmentID",
        "Marking",
        "OrgUnitID",
        "TrackingReference",
    ],
};

pub fn table_def(table: &str) -> Option<TableDef> {
    match table {
        "dsiactivities" | "dsiactivitiesarchive" => Some(ACTIVITIES),
        "dsitransactionlog" | "dsitransactionlogarchive" => Some(TRANSACTIONS),
        _ => None,
    }
}

pub fn is_archive_table(table: &str) -> bool {
    table == ACTIVITIES.archive_table || table == TRANSACTIONS.archive_table
}

pub fn is_main_table(table: &str) -> bool {
    table == ACTIVITIES.main_table || table == TRANSACTIONS.main_table
}

// date_start/date_end are fixed-width YYYYMMDDHHMMSS, so comparison is
// plain string comparison. date_comparison picks strict `<` vs `<=`.
#[derive(Debug, Clone, Default)]
pub struct OperationFilters {
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub date_comparison: Option<DateComparison>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComparison {
    OlderThan,
    UpTo,
}

#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    Preview {
        preview_count: i64,
        sample: Vec<serde_json::Value>,
        requires_confirmation: bool,
    },
    Executed {
        records_archived: i64,
        records_deleted: i64,
        records_skipped: i64,
        job_log_id: i64,
    },
}

#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    Preview {
        preview_count: i64,
        sample: Vec<serde_json::Value>,
        requires_confirmation: bool,
    },
    Executed {
        records_deleted: i64,
        job_log_id: i64,
    },
}
