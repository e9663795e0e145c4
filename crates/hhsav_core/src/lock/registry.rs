//! Static registry of protected save categories.

/// A field whose current literal value is protected when it is one of
/// `allowed_values`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedValueRule {
    pub field: &'static str,
    pub allowed_values: &'static [&'static str],
    pub ignore_case: bool,
}

impl LockedValueRule {
    pub fn protects(&self, literal: &str) -> bool {
        self.allowed_values.iter().any(|allowed| {
            if self.ignore_case {
                allowed.eq_ignore_ascii_case(literal)
            } else {
                *allowed == literal
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub id: &'static str,
    pub root_names: &'static [&'static str],
    pub locked_keys: &'static [&'static str],
    /// Keys tagged as protected in the tree; includes every locked key.
    pub highlight_keys: &'static [&'static str],
    pub locked_value_rules: &'static [LockedValueRule],
    pub direct_child_lock_only: bool,
    pub highlight_root_only: bool,
    /// `{field}` and `{path}` are substituted.
    pub detail_template: &'static str,
    pub status_blocked: &'static str,
    pub status_restored: &'static str,
}

pub const DEFAULT_POLICIES: &[LockPolicy] = &[
    LockPolicy {
        id: "bank_financial_core",
        root_names: &["Bank", "Banking"],
        locked_keys: &["accounts", "accountNumber", "routingNumber", "owner"],
        highlight_keys: &[
            "accounts",
            "accountNumber",
            "routingNumber",
            "owner",
            "bankName",
        ],
        locked_value_rules: &[],
        direct_child_lock_only: false,
        highlight_root_only: false,
        detail_template: "\"{field}\" under {path} is managed by the bank and cannot be edited.",
        status_blocked: "Bank edit blocked: protected field.",
        status_restored: "Protected bank fields restored.",
    },
    LockPolicy {
        id: "network_topology",
        root_names: &["Network", "Networks"],
        locked_keys: &["ip", "id", "subnet"],
        highlight_keys: &["ip", "id", "subnet", "type", "hostname"],
        locked_value_rules: &[LockedValueRule {
            field: "type",
            allowed_values: &["router", "server", "firewall", "workstation"],
            ignore_case: true,
        }],
        direct_child_lock_only: false,
        highlight_root_only: false,
        detail_template: "\"{field}\" under {path} defines the network layout and cannot be edited.",
        status_blocked: "Network edit blocked: protected field.",
        status_restored: "Protected network fields restored.",
    },
    LockPolicy {
        id: "player_identity",
        root_names: &["Player", "Profile"],
        locked_keys: &["id", "uuid", "steamId", "createdAt"],
        highlight_keys: &["id", "uuid", "steamId", "createdAt", "handle"],
        locked_value_rules: &[],
        direct_child_lock_only: true,
        highlight_root_only: true,
        detail_template: "\"{field}\" identifies the player and cannot be edited ({path}).",
        status_blocked: "Profile edit blocked: identity field.",
        status_restored: "Player identity restored.",
    },
    LockPolicy {
        id: "mail_system",
        root_names: &["Mail", "Email"],
        locked_keys: &["from", "messageId"],
        highlight_keys: &["from", "messageId"],
        locked_value_rules: &[],
        direct_child_lock_only: false,
        highlight_root_only: false,
        detail_template: "\"{field}\" under {path} is set by the mail server and cannot be edited.",
        status_blocked: "Mail edit blocked: protected field.",
        status_restored: "Protected mail fields restored.",
    },
    LockPolicy {
        id: "save_meta",
        root_names: &["Meta", "SaveInfo"],
        locked_keys: &["version", "checksum", "saveVersion"],
        highlight_keys: &["version", "checksum", "saveVersion"],
        locked_value_rules: &[],
        direct_child_lock_only: true,
        highlight_root_only: false,
        detail_template: "\"{field}\" is save metadata and cannot be edited ({path}).",
        status_blocked: "Save metadata is read-only.",
        status_restored: "Save metadata restored.",
    },
];
