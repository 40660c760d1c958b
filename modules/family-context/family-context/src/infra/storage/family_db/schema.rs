//! Collections of a family database.
//!
//! Documents keep the field names the application writes (`memberId`,
//! `isActive`, ...); the same layout is used by the legacy single-family file.

use finance_db::{CollectionSpec, IndexSpec};

/// Key of the family-local settings record in [`SETTINGS`].
pub const APP_SETTINGS_KEY: &str = "app_settings";

pub const FAMILY_MEMBERS: CollectionSpec =
    CollectionSpec::new("family_members", &[IndexSpec::unique("by_email", "email")]);

pub const ACCOUNTS: CollectionSpec = CollectionSpec::new(
    "accounts",
    &[
        IndexSpec::new("by_member_id", "memberId"),
        IndexSpec::new("by_type", "type"),
    ],
);

pub const TRANSACTIONS: CollectionSpec = CollectionSpec::new(
    "transactions",
    &[
        IndexSpec::new("by_account_id", "accountId"),
        IndexSpec::new("by_date", "date"),
        IndexSpec::new("by_category", "category"),
    ],
);

pub const ASSETS: CollectionSpec = CollectionSpec::new(
    "assets",
    &[
        IndexSpec::new("by_member_id", "memberId"),
        IndexSpec::new("by_type", "type"),
    ],
);

pub const GOALS: CollectionSpec =
    CollectionSpec::new("goals", &[IndexSpec::new("by_member_id", "memberId")]);

pub const RECURRING_ITEMS: CollectionSpec = CollectionSpec::new(
    "recurring_items",
    &[
        IndexSpec::new("by_account_id", "accountId"),
        IndexSpec::new("by_type", "type"),
        IndexSpec::new("by_is_active", "isActive"),
    ],
);

pub const SETTINGS: CollectionSpec = CollectionSpec::new("settings", &[]);

pub const SYNC_QUEUE: CollectionSpec = CollectionSpec::new(
    "sync_queue",
    &[
        IndexSpec::new("by_synced", "synced"),
        IndexSpec::new("by_timestamp", "timestamp"),
    ],
);

pub const TRANSLATIONS: CollectionSpec =
    CollectionSpec::new("translations", &[IndexSpec::new("by_language", "language")]);

/// Every collection of the current schema version.
pub const ALL: [CollectionSpec; 9] = [
    FAMILY_MEMBERS,
    ACCOUNTS,
    TRANSACTIONS,
    ASSETS,
    GOALS,
    RECURRING_ITEMS,
    SETTINGS,
    SYNC_QUEUE,
    TRANSLATIONS,
];
