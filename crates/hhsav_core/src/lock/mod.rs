//! Field-lock policies: block or repair edits that touch protected save fields.
//!
//! Policies come from a static registry and are compiled once into
//! normalized lookup tables. The first path segment selects the policy.

pub mod registry;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::path::{DocPath, PathSegment};

pub use registry::{DEFAULT_POLICIES, LockPolicy, LockedValueRule};

/// Minimum case-folded similarity for a new key to count as a typo of a
/// missing locked key.
pub const RENAMED_KEY_SIMILARITY: f64 = 0.78;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockViolation {
    pub path_label: String,
    pub field: String,
    pub detail: String,
    pub status_blocked: String,
    pub status_restored: String,
    pub policy_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum LockDecision {
    Allowed,
    Blocked(LockViolation),
}

impl LockDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Case-folded alphanumerics, used for root names and locked keys.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized Levenshtein similarity of two keys, ignoring case.
pub fn key_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

#[derive(Debug, Clone)]
struct CompiledPolicy {
    policy: &'static LockPolicy,
    roots: Vec<String>,
    locked: Vec<String>,
}

enum Scope {
    /// The edit sits inside this locked field.
    Whole(String),
    /// Locked keys among the edited node's members are checked.
    Members { deep: bool },
    Free,
}

impl CompiledPolicy {
    fn compile(policy: &'static LockPolicy) -> Self {
        Self {
            policy,
            roots: policy.root_names.iter().map(|n| normalize(n)).collect(),
            locked: policy.locked_keys.iter().map(|k| normalize(k)).collect(),
        }
    }

    fn is_locked(&self, key: &str) -> bool {
        self.locked.contains(&normalize(key))
    }

    fn value_rule(&self, key: &str) -> Option<&'static LockedValueRule> {
        let key = normalize(key);
        self.policy
            .locked_value_rules
            .iter()
            .find(|rule| normalize(rule.field) == key)
    }

    fn protects_literal(&self, key: &str, value: &Value) -> bool {
        match (self.value_rule(key), value.as_str()) {
            (Some(rule), Some(literal)) => rule.protects(literal),
            _ => false,
        }
    }

    fn scope(&self, path: &DocPath) -> Scope {
        let rest = path.segments().get(1..).unwrap_or_default();
        if self.policy.direct_child_lock_only {
            return match rest {
                [] => Scope::Members { deep: false },
                [PathSegment::Key(key)] if self.is_locked(key) => Scope::Whole(key.clone()),
                _ => Scope::Free,
            };
        }
        match rest
            .iter()
            .filter_map(PathSegment::as_key)
            .find(|key| self.is_locked(key))
        {
            Some(field) => Scope::Whole(field.to_string()),
            None => Scope::Members { deep: true },
        }
    }

    /// Deepest path segment governed by a value rule, when the edited node
    /// currently holds one of its protected literals.
    fn protected_value_field(&self, path: &DocPath, current: &Value) -> Option<String> {
        let field = path
            .segments()
            .get(1..)
            .unwrap_or_default()
            .iter()
            .rev()
            .filter_map(PathSegment::as_key)
            .find(|key| self.value_rule(key).is_some())?;
        self.protects_literal(field, current)
            .then(|| field.to_string())
    }

    fn violation(&self, path: &DocPath, current: &Value, new: &Value) -> Option<String> {
        if let Some(field) = self.protected_value_field(path, current) {
            if current != new {
                return Some(field);
            }
        }
        match self.scope(path) {
            Scope::Whole(field) => (current != new).then_some(field),
            Scope::Members { deep } => self.member_violation(current, new, deep),
            Scope::Free => None,
        }
    }

    fn member_violation(&self, current: &Value, new: &Value, deep: bool) -> Option<String> {
        match (current, new) {
            (Value::Object(cur), Value::Object(next)) => {
                for (key, cur_val) in cur {
                    let protected = self.is_locked(key) || self.protects_literal(key, cur_val);
                    if protected {
                        if next.get(key) != Some(cur_val) {
                            return Some(key.clone());
                        }
                        continue;
                    }
                    if deep {
                        let found = match next.get(key) {
                            Some(next_val) => self.member_violation(cur_val, next_val, deep),
                            None => self.locked_field_in(cur_val, deep),
                        };
                        if found.is_some() {
                            return found;
                        }
                    }
                }
                None
            }
            (Value::Array(cur), Value::Array(next)) if deep => cur
                .iter()
                .zip(next)
                .find_map(|(c, n)| self.member_violation(c, n, deep))
                .or_else(|| {
                    cur.get(next.len()..)
                        .unwrap_or_default()
                        .iter()
                        .find_map(|item| self.locked_field_in(item, deep))
                }),
            // Replacing a container with another shape drops whatever it protected.
            _ => self.locked_field_in(current, deep),
        }
    }

    /// First protected member held by `value`, searching nested members when
    /// `deep`.
    fn locked_field_in(&self, value: &Value, deep: bool) -> Option<String> {
        match value {
            Value::Object(map) => map.iter().find_map(|(key, val)| {
                if self.is_locked(key) || self.protects_literal(key, val) {
                    Some(key.clone())
                } else if deep {
                    self.locked_field_in(val, deep)
                } else {
                    None
                }
            }),
            Value::Array(items) if deep => items
                .iter()
                .find_map(|item| self.locked_field_in(item, deep)),
            _ => None,
        }
    }

    fn restore_node(&self, path: &DocPath, current: &Value, new: &mut Value) -> bool {
        let whole = self.protected_value_field(path, current).is_some();
        match self.scope(path) {
            Scope::Whole(_) => restore_whole(current, new),
            _ if whole => restore_whole(current, new),
            Scope::Members { deep } => self.restore_members(current, new, deep),
            Scope::Free => false,
        }
    }

    fn restore_members(&self, current: &Value, new: &mut Value, deep: bool) -> bool {
        match (current, &mut *new) {
            (Value::Object(cur), Value::Object(next)) => {
                let mut changed = false;
                for (index, (key, cur_val)) in cur.iter().enumerate() {
                    if self.is_locked(key) || self.protects_literal(key, cur_val) {
                        changed |= restore_locked_key(cur, next, index, key, cur_val);
                    } else if deep {
                        match next.get_mut(key) {
                            Some(next_val) => changed |= self.restore_members(cur_val, next_val, deep),
                            None if self.locked_field_in(cur_val, deep).is_some() => {
                                put_back(next, key, cur_val.clone(), None, index);
                                changed = true;
                            }
                            None => {}
                        }
                    }
                }
                return changed;
            }
            (Value::Array(cur), Value::Array(next)) if deep => {
                let mut changed = false;
                for (c, n) in cur.iter().zip(next.iter_mut()) {
                    changed |= self.restore_members(c, n, deep);
                }
                let tail = cur.get(next.len()..).unwrap_or_default();
                if tail.iter().any(|item| self.locked_field_in(item, deep).is_some()) {
                    next.extend(tail.iter().cloned());
                    changed = true;
                }
                return changed;
            }
            _ => {}
        }
        if self.locked_field_in(current, deep).is_some() {
            restore_whole(current, new)
        } else {
            false
        }
    }
}

fn restore_whole(current: &Value, new: &mut Value) -> bool {
    if new == current {
        return false;
    }
    *new = current.clone();
    true
}

/// Puts `key` back into `next` with a deep copy of `cur_val`.
///
/// A missing key is recovered from its most similar typo (which keeps the
/// typo's slot); otherwise it is re-inserted at its original index.
fn restore_locked_key(
    cur: &Map<String, Value>,
    next: &mut Map<String, Value>,
    original_index: usize,
    key: &str,
    cur_val: &Value,
) -> bool {
    if let Some(existing) = next.get_mut(key) {
        return restore_whole(cur_val, existing);
    }
    let typo = renamed_key(cur, next, key);
    put_back(next, key, cur_val.clone(), typo.as_deref(), original_index);
    true
}

/// The key of `next` unknown to `cur` that is close enough to be a typo of
/// `key`.
fn renamed_key(cur: &Map<String, Value>, next: &Map<String, Value>, key: &str) -> Option<String> {
    let mut typo: Option<(f64, String)> = None;
    for candidate in next.keys().filter(|k| !cur.contains_key(k.as_str())) {
        let score = key_similarity(key, candidate);
        if score >= RENAMED_KEY_SIMILARITY && typo.as_ref().is_none_or(|(best, _)| score > *best) {
            typo = Some((score, candidate.clone()));
        }
    }
    let (score, typo) = typo?;
    tracing::debug!(key, typo = %typo, score, "recovering renamed locked key");
    Some(typo)
}

/// Inserts `key` in the slot of `typo`, or at `index` without one.
fn put_back(
    next: &mut Map<String, Value>,
    key: &str,
    value: Value,
    typo: Option<&str>,
    index: usize,
) {
    let mut value = Some(value);
    let entries = std::mem::take(next);
    for (position, (k, v)) in entries.into_iter().enumerate() {
        let is_typo = typo == Some(k.as_str());
        let slot = match typo {
            Some(_) => is_typo,
            None => position == index,
        };
        if slot {
            if let Some(value) = value.take() {
                next.insert(key.to_string(), value);
            }
        }
        if !is_typo {
            next.insert(k, v);
        }
    }
    if let Some(value) = value {
        next.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone)]
pub struct LockPolicyEngine {
    policies: Vec<CompiledPolicy>,
    override_once: bool,
}

impl Default for LockPolicyEngine {
    fn default() -> Self {
        Self::new(DEFAULT_POLICIES)
    }
}

impl LockPolicyEngine {
    pub fn new(registry: &'static [LockPolicy]) -> Self {
        Self {
            policies: registry.iter().map(CompiledPolicy::compile).collect(),
            override_once: false,
        }
    }

    /// Editor variant without any protected fields.
    pub fn unlocked() -> Self {
        Self::new(&[])
    }

    pub fn is_unlocked(&self) -> bool {
        self.policies.is_empty()
    }

    /// The next evaluation is allowed unconditionally; the flag then clears.
    pub fn allow_highlight_key_change_once(&mut self) {
        self.override_once = true;
    }

    pub fn override_pending(&self) -> bool {
        self.override_once
    }

    fn policy_for_root(&self, name: &str) -> Option<&CompiledPolicy> {
        let name = normalize(name);
        self.policies.iter().find(|policy| policy.roots.contains(&name))
    }

    fn policy_for(&self, path: &DocPath) -> Option<&CompiledPolicy> {
        self.policy_for_root(path.first_key()?)
    }

    pub fn policy_for_path(&self, path: &DocPath) -> Option<&'static LockPolicy> {
        self.policy_for(path).map(|compiled| compiled.policy)
    }

    pub fn policy_id_for(&self, path: &DocPath) -> Option<&'static str> {
        self.policy_for(path).map(|compiled| compiled.policy.id)
    }

    /// Whether a member named `key` of the node at `path` is protected.
    pub fn is_locked_key(&self, path: &DocPath, key: &str) -> bool {
        let Some(compiled) = self.policy_for(path) else {
            return false;
        };
        if compiled.policy.direct_child_lock_only && path.len() > 1 {
            return false;
        }
        compiled.is_locked(key)
    }

    /// Lookup handed to the diagnostic rules for a buffer rendered at `path`.
    pub fn locked_key_lookup<'a>(&'a self, path: &DocPath) -> impl Fn(&str) -> bool + 'a {
        let path = path.clone();
        move |key: &str| self.is_locked_key(&path, key)
    }

    /// Keys a tree view tags as protected among the children of `path`.
    pub fn highlight_keys_for(&self, path: &DocPath) -> &'static [&'static str] {
        match self.policy_for(path) {
            Some(compiled) if compiled.policy.highlight_root_only && path.len() != 1 => &[],
            Some(compiled) => compiled.policy.highlight_keys,
            None => &[],
        }
    }

    pub fn evaluate(&mut self, path: &DocPath, current: &Value, new: &Value) -> LockDecision {
        if std::mem::take(&mut self.override_once) {
            tracing::debug!(path = %path.label(), "lock override consumed");
            return LockDecision::Allowed;
        }
        let found = if path.is_root() {
            self.root_violation(current, new)
        } else {
            self.policy_for(path).and_then(|compiled| {
                compiled
                    .violation(path, current, new)
                    .map(|field| (compiled, path.clone(), field))
            })
        };
        let Some((compiled, at, field)) = found else {
            return LockDecision::Allowed;
        };
        let policy = compiled.policy;
        let path_label = at.label();
        tracing::info!(policy = policy.id, field = %field, path = %path_label, "edit blocked by lock policy");
        LockDecision::Blocked(LockViolation {
            detail: policy
                .detail_template
                .replace("{field}", &field)
                .replace("{path}", &path_label),
            path_label,
            field,
            status_blocked: policy.status_blocked.to_string(),
            status_restored: policy.status_restored.to_string(),
            policy_id: policy.id.to_string(),
        })
    }

    fn root_violation(
        &self,
        current: &Value,
        new: &Value,
    ) -> Option<(&CompiledPolicy, DocPath, String)> {
        let Value::Object(cur) = current else {
            return None;
        };
        let next = new.as_object();
        cur.iter().find_map(|(key, cur_val)| {
            let compiled = self.policy_for_root(key)?;
            // A dropped or renamed root reads as null.
            let next_val = next.and_then(|next| next.get(key)).unwrap_or(&Value::Null);
            let at = DocPath::root().child(key.as_str());
            compiled
                .violation(&at, cur_val, next_val)
                .map(|field| (compiled, at, field))
        })
    }

    /// Copies every protected field from `current` into `new`.
    pub fn restore(&self, path: &DocPath, current: &Value, new: &Value) -> (bool, Value) {
        let mut repaired = new.clone();
        let changed = if path.is_root() {
            self.restore_roots(current, &mut repaired)
        } else {
            self.policy_for(path)
                .is_some_and(|compiled| compiled.restore_node(path, current, &mut repaired))
        };
        if changed {
            tracing::debug!(path = %path.label(), "locked fields restored");
        }
        (changed, repaired)
    }

    /// Root edits restore each policy root; a root that went missing comes
    /// back from its typo or at its original index.
    fn restore_roots(&self, current: &Value, repaired: &mut Value) -> bool {
        let Value::Object(cur) = current else {
            return false;
        };
        let mut changed = false;
        for (index, (key, cur_val)) in cur.iter().enumerate() {
            let Some(compiled) = self.policy_for_root(key) else {
                continue;
            };
            let at = DocPath::root().child(key.as_str());
            let missing = repaired.as_object().is_none_or(|next| !next.contains_key(key));
            if missing && compiled.violation(&at, cur_val, &Value::Null).is_none() {
                continue;
            }
            if !repaired.is_object() {
                *repaired = Value::Object(Map::new());
                changed = true;
            }
            let Value::Object(next) = &mut *repaired else {
                continue;
            };
            if let Some(next_val) = next.get_mut(key) {
                changed |= compiled.restore_node(&at, cur_val, next_val);
                continue;
            }
            let typo = renamed_key(cur, next, key);
            let mut value = typo
                .as_deref()
                .and_then(|typo| next.get(typo))
                .cloned()
                .unwrap_or(Value::Null);
            compiled.restore_node(&at, cur_val, &mut value);
            put_back(next, key, value, typo.as_deref(), index);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};

    use super::{LockDecision, LockPolicyEngine, RENAMED_KEY_SIMILARITY, key_similarity};
    use crate::document::path::DocPath;

    fn bank() -> DocPath {
        DocPath::root().child("Bank")
    }

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn renamed_bank_accounts_key_is_blocked_and_recovered() {
        let current = json!({"accounts": [{"balance": 10}], "bankName": "HB"});
        let new = json!({"acconts": [{"balance": 99}], "bankName": "HB"});
        let mut engine = LockPolicyEngine::default();

        let LockDecision::Blocked(violation) = engine.evaluate(&bank(), &current, &new) else {
            panic!("rename should be blocked");
        };
        assert_eq!(violation.policy_id, "bank_financial_core");
        assert_eq!(violation.field, "accounts");
        assert_eq!(violation.path_label, "Bank");
        assert!(violation.detail.contains("\"accounts\""));

        let (changed, repaired) = engine.restore(&bank(), &current, &new);
        assert!(changed);
        assert_eq!(repaired, current);
        assert_eq!(keys(&repaired), vec!["accounts", "bankName"]);
    }

    #[test]
    fn root_edit_checks_every_policy_root() {
        let current = json!({"Meta": {"version": 3}, "Bank": {"owner": "ali"}});
        let new = json!({"Meta": {"version": 3}, "Bank": {"owner": "eve"}});
        let mut engine = LockPolicyEngine::default();
        let LockDecision::Blocked(violation) = engine.evaluate(&DocPath::root(), &current, &new)
        else {
            panic!("owner change should be blocked");
        };
        assert_eq!(violation.field, "owner");
        let (changed, repaired) = engine.restore(&DocPath::root(), &current, &new);
        assert!(changed);
        assert_eq!(repaired, current);
    }

    #[test]
    fn unchanged_locked_keys_and_free_fields_are_allowed() {
        let current = json!({"owner": "ali", "balance": 5});
        let new = json!({"owner": "ali", "balance": 500});
        let mut engine = LockPolicyEngine::default();
        assert!(engine.evaluate(&bank(), &current, &new).is_allowed());
        let (changed, repaired) = engine.restore(&bank(), &current, &new);
        assert!(!changed);
        assert_eq!(repaired, new);
    }

    #[test]
    fn editing_inside_a_locked_field_is_blocked() {
        let path = bank().child("accounts").child(0usize).child("balance");
        let mut engine = LockPolicyEngine::default();
        let decision = engine.evaluate(&path, &json!(10), &json!(11));
        assert!(!decision.is_allowed());
        let (changed, repaired) = engine.restore(&path, &json!(10), &json!(11));
        assert!(changed);
        assert_eq!(repaired, json!(10));
    }

    #[test]
    fn direct_child_policies_ignore_deeper_keys() {
        let mut engine = LockPolicyEngine::default();
        let player = DocPath::root().child("Player");

        let blocked = engine.evaluate(
            &player,
            &json!({"id": 7, "stats": {"id": 1}}),
            &json!({"id": 8, "stats": {"id": 1}}),
        );
        assert!(!blocked.is_allowed());

        let nested = engine.evaluate(&player.child("stats"), &json!({"id": 1}), &json!({"id": 2}));
        assert!(nested.is_allowed());

        let direct = engine.evaluate(&player.child("id"), &json!(7), &json!(8));
        assert!(!direct.is_allowed());
    }

    #[test]
    fn value_rules_protect_known_literals_only() {
        let mut engine = LockPolicyEngine::default();
        let path = DocPath::root()
            .child("Network")
            .child(0usize)
            .child("type");
        assert!(
            !engine
                .evaluate(&path, &json!("router"), &json!("desktop"))
                .is_allowed()
        );
        assert!(
            engine
                .evaluate(&path, &json!("desktop"), &json!("server"))
                .is_allowed()
        );

        let node = DocPath::root().child("Network").child(0usize);
        let current = json!({"type": "Server", "hostname": "a"});
        let new = json!({"type": "laptop", "hostname": "b"});
        let (changed, repaired) = engine.restore(&node, &current, &new);
        assert!(changed);
        assert_eq!(repaired, json!({"type": "Server", "hostname": "b"}));
    }

    #[test]
    fn override_is_honored_exactly_once() {
        let mut engine = LockPolicyEngine::default();
        let current = json!({"owner": "ali"});
        let new = json!({"owner": "eve"});
        engine.allow_highlight_key_change_once();
        assert!(engine.evaluate(&bank(), &current, &new).is_allowed());
        assert!(!engine.override_pending());
        assert!(!engine.evaluate(&bank(), &current, &new).is_allowed());
    }

    #[test]
    fn unlocked_engine_allows_everything() {
        let mut engine = LockPolicyEngine::unlocked();
        assert!(engine.is_unlocked());
        let decision = engine.evaluate(&bank(), &json!({"owner": "a"}), &json!({}));
        assert!(decision.is_allowed());
        assert!(engine.highlight_keys_for(&bank()).is_empty());
    }

    #[test]
    fn vanished_key_is_reinserted_at_original_index() {
        let engine = LockPolicyEngine::default();
        let current = json!({"owner": "ali", "x": 1, "accountNumber": "123"});
        let new = json!({"x": 2, "accountNumber": "123"});
        let (changed, repaired) = engine.restore(&bank(), &current, &new);
        assert!(changed);
        assert_eq!(keys(&repaired), vec!["owner", "x", "accountNumber"]);
        assert_eq!(repaired["x"], json!(2));
    }

    #[test]
    fn replacing_bank_with_another_shape_is_blocked_and_restored() {
        let current = json!({"owner": "ali", "accounts": [{"accountNumber": "1"}]});
        for replacement in [json!([]), Value::Null, json!("x")] {
            let mut engine = LockPolicyEngine::default();
            let LockDecision::Blocked(violation) = engine.evaluate(&bank(), &current, &replacement)
            else {
                panic!("{replacement} should be blocked");
            };
            assert_eq!(violation.field, "owner");
            let (changed, repaired) = engine.restore(&bank(), &current, &replacement);
            assert!(changed);
            assert_eq!(repaired, current);
        }
    }

    #[test]
    fn shape_change_below_a_free_key_is_blocked() {
        let current = json!({"notes": {"owner": "ali"}, "bankName": "HB"});
        let new = json!({"notes": 3, "bankName": "HC"});
        let mut engine = LockPolicyEngine::default();
        let LockDecision::Blocked(violation) = engine.evaluate(&bank(), &current, &new) else {
            panic!("nested owner should be protected");
        };
        assert_eq!(violation.field, "owner");
        let (changed, repaired) = engine.restore(&bank(), &current, &new);
        assert!(changed);
        assert_eq!(repaired, json!({"notes": {"owner": "ali"}, "bankName": "HC"}));
    }

    fn sample_root() -> Value {
        json!({
            "Meta": {"version": 3},
            "Bank": {"owner": "ali", "bankName": "HB"},
            "User": {"name": "a"}
        })
    }

    #[test]
    fn root_edit_dropping_bank_is_blocked_and_reinserted() {
        let current = sample_root();
        let new = json!({"Meta": {"version": 3}, "User": {"name": "b"}});
        let mut engine = LockPolicyEngine::default();
        let LockDecision::Blocked(violation) = engine.evaluate(&DocPath::root(), &current, &new)
        else {
            panic!("dropping Bank should be blocked");
        };
        assert_eq!(violation.policy_id, "bank_financial_core");
        assert_eq!(violation.path_label, "Bank");
        assert_eq!(violation.field, "owner");

        let (changed, repaired) = engine.restore(&DocPath::root(), &current, &new);
        assert!(changed);
        assert_eq!(keys(&repaired), vec!["Meta", "Bank", "User"]);
        assert_eq!(repaired["Bank"], current["Bank"]);
        assert_eq!(repaired["User"]["name"], "b");
    }

    #[test]
    fn root_edit_renaming_bank_is_blocked_and_recovered() {
        let current = sample_root();
        let new = json!({
            "Meta": {"version": 3},
            "Bnak": {"owner": "eve", "bankName": "HB"},
            "User": {"name": "a"}
        });
        let mut engine = LockPolicyEngine::default();
        let LockDecision::Blocked(violation) = engine.evaluate(&DocPath::root(), &current, &new)
        else {
            panic!("renaming Bank should be blocked");
        };
        assert_eq!(violation.path_label, "Bank");
        let (changed, repaired) = engine.restore(&DocPath::root(), &current, &new);
        assert!(changed);
        assert_eq!(keys(&repaired), vec!["Meta", "Bank", "Bnak", "User"]);
        assert_eq!(repaired["Bank"], current["Bank"]);

        // Close enough to count as a typo: the slot is reused and free edits survive.
        let new = json!({
            "Meta": {"version": 3},
            "Banks": {"owner": "eve", "bankName": "HC"},
            "User": {"name": "a"}
        });
        let (changed, repaired) = engine.restore(&DocPath::root(), &current, &new);
        assert!(changed);
        assert_eq!(keys(&repaired), vec!["Meta", "Bank", "User"]);
        assert_eq!(repaired["Bank"], json!({"owner": "ali", "bankName": "HC"}));
    }

    #[test]
    fn root_replaced_by_a_scalar_keeps_policy_roots() {
        let current = sample_root();
        let mut engine = LockPolicyEngine::default();
        let LockDecision::Blocked(violation) =
            engine.evaluate(&DocPath::root(), &current, &json!(null))
        else {
            panic!("clearing the save should be blocked");
        };
        assert_eq!(violation.policy_id, "save_meta");
        let (changed, repaired) = engine.restore(&DocPath::root(), &current, &json!(null));
        assert!(changed);
        assert_eq!(keys(&repaired), vec!["Meta", "Bank"]);
        assert_eq!(repaired["Bank"], current["Bank"]);
    }

    #[test]
    fn highlight_keys_respect_root_only_flag() {
        let engine = LockPolicyEngine::default();
        let player = DocPath::root().child("Player");
        assert!(engine.highlight_keys_for(&player).contains(&"steamId"));
        assert!(engine.highlight_keys_for(&player.child("stats")).is_empty());
        let account = bank().child("accounts").child(0usize);
        assert!(engine.highlight_keys_for(&account).contains(&"accountNumber"));
    }

    #[test]
    fn locked_key_lookup_matches_locked_keys() {
        let engine = LockPolicyEngine::default();
        let path = bank();
        let is_locked = engine.locked_key_lookup(&path);
        assert!(is_locked("Accounts"));
        assert!(!is_locked("balance"));
    }

    fn object_from(entries: Vec<(&'static str, Value)>) -> Value {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    fn any_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (0i64..4).prop_map(Value::from),
            prop::sample::select(vec!["router", "Server", "desktop", "ali"]).prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 32, 5, |inner| {
            let key = prop::sample::select(vec![
                "accounts",
                "accountNumber",
                "owner",
                "balance",
                "acconts",
                "ownr",
                "notes",
                "type",
                "id",
                "version",
            ]);
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec((key, inner), 0..6).prop_map(object_from),
            ]
        })
    }

    fn any_document() -> impl Strategy<Value = Value> {
        let root = prop::sample::select(vec![
            "Bank", "Bnak", "Banks", "Network", "Player", "Meta", "User",
        ]);
        prop_oneof![
            4 => prop::collection::vec((root, any_json()), 0..5).prop_map(object_from),
            1 => any_json(),
        ]
    }

    proptest! {
        #[test]
        fn restore_keeps_locked_fields_for_any_shape(
            root in prop::sample::select(vec!["Bank", "Network", "Player", "Meta", "Mail"]),
            current in any_json(),
            new in any_json(),
        ) {
            let mut engine = LockPolicyEngine::default();
            let path = DocPath::root().child(root);
            let (_, once) = engine.restore(&path, &current, &new);
            let (again, twice) = engine.restore(&path, &current, &once);
            prop_assert!(!again);
            prop_assert_eq!(&once, &twice);
            prop_assert!(engine.evaluate(&path, &current, &once).is_allowed());
            if let Some(cur) = current.as_object() {
                for (key, value) in cur {
                    if engine.is_locked_key(&path, key) {
                        prop_assert_eq!(once.get(key.as_str()), Some(value));
                    }
                }
            }
        }

        #[test]
        fn root_restore_keeps_every_policy_root(
            current in any_document(),
            new in any_document(),
        ) {
            let mut engine = LockPolicyEngine::default();
            let root = DocPath::root();
            let (_, once) = engine.restore(&root, &current, &new);
            let (again, twice) = engine.restore(&root, &current, &once);
            prop_assert!(!again);
            prop_assert_eq!(&once, &twice);
            prop_assert!(engine.evaluate(&root, &current, &once).is_allowed());
        }

        #[test]
        fn single_substitution_typos_are_recovered_in_place(
            key in prop::sample::select(vec!["accounts", "accountNumber", "routingNumber", "owner"]),
            position in 0usize..13,
            replacement in prop::char::range('a', 'z'),
        ) {
            let position = position % key.len();
            let typo: String = key
                .chars()
                .enumerate()
                .map(|(i, c)| if i == position { replacement } else { c })
                .collect();
            let mut current = Map::new();
            current.insert(key.to_string(), json!("v"));
            current.insert("other".to_string(), json!(1));
            let mut new = Map::new();
            new.insert(typo.clone(), json!("changed"));
            new.insert("other".to_string(), json!(1));

            let engine = LockPolicyEngine::default();
            let (_, repaired) = engine.restore(&bank(), &Value::Object(current), &Value::Object(new));
            prop_assert_eq!(keys(&repaired), vec![key, "other"]);
            prop_assert_eq!(&repaired[key], &json!("v"));
        }

        #[test]
        fn dissimilar_keys_are_never_treated_as_renames(typo in "[a-z]{3,10}") {
            prop_assume!(typo != "accounts");
            let current = json!({"accounts": 1});
            let mut new = Map::new();
            new.insert(typo.clone(), json!(2));
            let engine = LockPolicyEngine::default();
            let (_, repaired) = engine.restore(&bank(), &current, &Value::Object(new));
            let kept_typo = repaired.get(typo.as_str()).is_some();
            prop_assert_eq!(kept_typo, key_similarity("accounts", &typo) < RENAMED_KEY_SIMILARITY);
            prop_assert_eq!(&repaired["accounts"], &json!(1));
        }
    }
}
