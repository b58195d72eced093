//! Thin wrapper around `yrs::Doc` exposing exactly the four capabilities the sync
//! layer needs: construction, change application, change extraction given a remote
//! clock, and (via the explicit `mutate`/`apply_changes` return values) a
//! change-observation signal. The sync layer never touches `yrs` types directly.

use std::collections::BTreeMap;

use weave_types::prelude::*;
use yrs::{
	Doc, Map, MapRef, ReadTxn, Transact, TransactionMut,
	types::Value as YValue,
	updates::{decoder::Decode, encoder::Encode},
	Any, Update,
};

const ROOT_MAP: &str = "state";

/// One entry in a document's append-only per-actor change log. `seq` is 1-based and
/// strictly increasing per actor; `update` is the raw `yrs` update diff produced by
/// the transaction that authored this entry.
#[derive(Debug, Clone)]
struct LoggedChange {
	actor: ActorId,
	seq: u64,
	update: Vec<u8>,
}

/// Header-framed encoding of a single [`LoggedChange`]: `[actor_len: u16 BE][actor
/// bytes][seq: u64 BE][yrs update bytes]`. Mirrors the byte-prefixed framing the
/// reference codebase uses for its own CRDT websocket messages.
fn encode_change(actor: &str, seq: u64, update: &[u8]) -> Change {
	let actor_bytes = actor.as_bytes();
	let mut buf = Vec::with_capacity(2 + actor_bytes.len() + 8 + update.len());
	#[allow(clippy::cast_possible_truncation)]
	let actor_len = actor_bytes.len() as u16;
	buf.extend_from_slice(&actor_len.to_be_bytes());
	buf.extend_from_slice(actor_bytes);
	buf.extend_from_slice(&seq.to_be_bytes());
	buf.extend_from_slice(update);
	Change::new(buf)
}

fn decode_change(change: &Change) -> WeaveResult<(ActorId, u64, &[u8])> {
	let bytes = change.as_bytes();
	if bytes.len() < 2 {
		warn!(len = bytes.len(), "change too short to contain an actor-id length header");
		return Err(Error::Persistence("change too short to contain an actor-id length header".into()));
	}
	let actor_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
	let rest = &bytes[2..];
	if rest.len() < actor_len + 8 {
		warn!(actor_len, rest_len = rest.len(), "change truncated before actor id or sequence header");
		return Err(Error::Persistence("change truncated before actor id or sequence header".into()));
	}
	let actor_str = std::str::from_utf8(&rest[..actor_len]).map_err(|_| {
		warn!("change actor id is not valid UTF-8");
		Error::Persistence("change actor id is not valid UTF-8".into())
	})?;
	let seq_bytes: [u8; 8] = rest[actor_len..actor_len + 8].try_into().map_err(|_| {
		warn!("malformed sequence header");
		Error::Persistence("malformed sequence header".into())
	})?;
	let seq = u64::from_be_bytes(seq_bytes);
	let update = &rest[actor_len + 8..];
	Ok((ActorId::from(actor_str), seq, update))
}

/// A single CRDT document: a `yrs` doc plus the change log the sync layer needs to
/// compute vector clocks and diffs against it.
pub struct CrdtDocument {
	doc: Doc,
	root: MapRef,
	local_actor: ActorId,
	log: Vec<LoggedChange>,
}

impl CrdtDocument {
	/// A fresh, empty document authored locally by `local_actor`.
	pub fn new_empty(local_actor: ActorId) -> Self {
		let doc = Doc::new();
		let root = doc.get_or_insert_map(ROOT_MAP);
		Self { doc, root, local_actor, log: Vec::new() }
	}

	/// A fresh document whose root map is populated from `initial_state` as a single
	/// local change (sequence 1).
	pub fn with_initial_state(local_actor: ActorId, initial_state: &serde_json::Value) -> WeaveResult<Self> {
		let mut this = Self::new_empty(local_actor);
		let object = initial_state
			.as_object()
			.ok_or_else(|| Error::Persistence("initial state must be a JSON object".into()))?;
		if !object.is_empty() {
			this.mutate(|root, txn| {
				for (key, value) in object {
					root.insert(txn, key.clone(), json_to_any(value));
				}
			});
		}
		Ok(this)
	}

	pub fn local_actor(&self) -> &ActorId {
		&self.local_actor
	}

	/// The document's current vector clock: for every actor that has contributed a
	/// change (locally authored or received from a peer), the highest sequence number
	/// logged for it so far.
	pub fn clock(&self) -> VectorClock {
		let mut map: BTreeMap<String, u64> = BTreeMap::new();
		for entry in &self.log {
			let slot = map.entry(entry.actor.as_str().to_string()).or_insert(0);
			if entry.seq > *slot {
				*slot = entry.seq;
			}
		}
		VectorClock::from(map)
	}

	/// Read-only snapshot of the document's current value as JSON, suitable for
	/// handing to the host application.
	pub fn snapshot(&self) -> serde_json::Value {
		let txn = self.doc.transact();
		let mut object = serde_json::Map::new();
		for (key, value) in self.root.iter(&txn) {
			object.insert(key.to_string(), yvalue_to_json(&value, &txn));
		}
		serde_json::Value::Object(object)
	}

	/// Perform one local mutation, returning the resulting [`Change`]. Advances the
	/// local actor's sequence by one and appends it to the change log.
	pub fn mutate(&mut self, f: impl FnOnce(&MapRef, &mut TransactionMut)) -> Change {
		let next_seq = self.clock().get(self.local_actor.as_str()) + 1;
		let update = {
			let mut txn = self.doc.transact_mut();
			let before = txn.state_vector();
			f(&self.root, &mut txn);
			txn.encode_state_as_update_v1(&before)
		};
		self.log.push(LoggedChange { actor: self.local_actor.clone(), seq: next_seq, update: update.clone() });
		encode_change(self.local_actor.as_str(), next_seq, &update)
	}

	/// Apply remote changes to the local replica. Already-seen `(actor, seq)` pairs
	/// are skipped, making repeated `apply_changes` calls with the same input
	/// idempotent as required by the CRDT semantics. Returns only the changes that
	/// were newly applied (empty if every change was already known), so the caller
	/// can tell whether the document actually advanced.
	pub fn apply_changes(&mut self, changes: &[Change]) -> WeaveResult<Vec<Change>> {
		let mut applied = Vec::new();
		for change in changes {
			let (actor, seq, update_bytes) = decode_change(change)?;
			let known = self.log.iter().any(|e| e.actor == actor && e.seq == seq);
			if known {
				continue;
			}
			let update = Update::decode_v1(update_bytes)
				.map_err(|e| Error::Persistence(format!("failed to decode CRDT update: {e}")))?;
			{
				let mut txn = self.doc.transact_mut();
				txn.apply_update(update)
					.map_err(|e| Error::Persistence(format!("failed to apply CRDT update: {e}")))?;
			}
			self.log.push(LoggedChange { actor: actor.clone(), seq, update: update_bytes.to_vec() });
			applied.push(encode_change(actor.as_str(), seq, update_bytes));
		}
		Ok(applied)
	}

	/// All changes logged (locally authored or previously received) that `theirs`
	/// does not yet reflect, i.e. `missingChanges(localState, theirs)`.
	pub fn missing_changes(&self, theirs: &VectorClock) -> Vec<Change> {
		self.log
			.iter()
			.filter(|entry| entry.seq > theirs.get(entry.actor.as_str()))
			.map(|entry| encode_change(entry.actor.as_str(), entry.seq, &entry.update))
			.collect()
	}

	/// The full change log in insertion order, used by the storage adapter to persist
	/// a write-ahead log and by `init` to replay it.
	pub fn change_log(&self) -> Vec<Change> {
		self.log.iter().map(|e| encode_change(e.actor.as_str(), e.seq, &e.update)).collect()
	}
}

fn json_to_any(value: &serde_json::Value) -> Any {
	match value {
		serde_json::Value::Null => Any::Null,
		serde_json::Value::Bool(b) => Any::Bool(*b),
		serde_json::Value::Number(n) => n.as_f64().map(Any::Number).unwrap_or(Any::Null),
		serde_json::Value::String(s) => Any::String(s.as_str().into()),
		// `.into()` lets the target container (Rc/Box, HashMap/IndexMap) be inferred
		// from `Any`'s own field types rather than hard-coded here.
		serde_json::Value::Array(items) => {
			Any::Array(items.iter().map(json_to_any).collect::<Vec<_>>().into())
		}
		serde_json::Value::Object(map) => {
			let converted: std::collections::HashMap<String, Any> =
				map.iter().map(|(k, v)| (k.clone(), json_to_any(v))).collect();
			Any::Map(converted.into())
		}
	}
}

fn yvalue_to_json<T: ReadTxn>(value: &YValue, _txn: &T) -> serde_json::Value {
	match value {
		YValue::Any(any) => any_to_json(any),
		// Nested shared types (Text/Map/Array refs) never occur in our root map: every
		// mutation through `mutate`/`with_initial_state` only ever inserts scalar `Any`
		// values, so this branch is unreachable in practice and kept only to stay total.
		_ => serde_json::Value::Null,
	}
}

fn any_to_json(any: &Any) -> serde_json::Value {
	match any {
		Any::Null | Any::Undefined => serde_json::Value::Null,
		Any::Bool(b) => serde_json::Value::Bool(*b),
		Any::Number(n) => serde_json::Number::from_f64(*n)
			.map(serde_json::Value::Number)
			.unwrap_or(serde_json::Value::Null),
		Any::BigInt(n) => serde_json::Value::Number((*n).into()),
		Any::String(s) => serde_json::Value::String(s.to_string()),
		Any::Array(items) => serde_json::Value::Array(items.iter().map(any_to_json).collect()),
		Any::Map(map) => {
			let object: serde_json::Map<String, serde_json::Value> =
				map.iter().map(|(k, v)| (k.clone(), any_to_json(v))).collect();
			serde_json::Value::Object(object)
		}
		Any::Buffer(bytes) => {
			serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::Number((*b).into())).collect())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn with_initial_state_seeds_root_map() {
		let doc = CrdtDocument::with_initial_state("A".into(), &json!({"x": 1})).unwrap();
		assert_eq!(doc.snapshot(), json!({"x": 1.0}));
		assert_eq!(doc.clock().get("A"), 1);
	}

	#[test]
	fn mutate_advances_local_clock_and_produces_a_change() {
		let mut doc = CrdtDocument::new_empty("A".into());
		let change = doc.mutate(|root, txn| {
			root.insert(txn, "x".to_string(), Any::Number(1.0));
		});
		assert_eq!(doc.clock().get("A"), 1);
		assert!(!change.as_bytes().is_empty());
	}

	#[test]
	fn missing_changes_excludes_what_peer_already_has() {
		let mut doc = CrdtDocument::new_empty("A".into());
		doc.mutate(|root, txn| root.insert(txn, "x".to_string(), Any::Number(1.0)));
		doc.mutate(|root, txn| root.insert(txn, "y".to_string(), Any::Number(2.0)));

		let mut theirs = VectorClock::new();
		assert_eq!(doc.missing_changes(&theirs).len(), 2);

		theirs.set("A", 1);
		assert_eq!(doc.missing_changes(&theirs).len(), 1);

		theirs.set("A", 2);
		assert!(doc.missing_changes(&theirs).is_empty());
	}

	#[test]
	fn apply_changes_converges_two_replicas() {
		let mut a = CrdtDocument::new_empty("A".into());
		a.mutate(|root, txn| root.insert(txn, "x".to_string(), Any::Number(1.0)));

		let mut b = CrdtDocument::new_empty("B".into());
		let missing = a.missing_changes(&VectorClock::new());
		b.apply_changes(&missing).unwrap();

		assert_eq!(b.snapshot(), a.snapshot());
		assert_eq!(b.clock(), a.clock());
	}

	#[test]
	fn apply_changes_is_idempotent() {
		let mut a = CrdtDocument::new_empty("A".into());
		a.mutate(|root, txn| root.insert(txn, "x".to_string(), Any::Number(1.0)));
		let changes = a.missing_changes(&VectorClock::new());

		let mut b = CrdtDocument::new_empty("B".into());
		b.apply_changes(&changes).unwrap();
		let snapshot_once = b.snapshot();
		b.apply_changes(&changes).unwrap();
		assert_eq!(b.snapshot(), snapshot_once);
		assert_eq!(b.clock().get("A"), 1);
	}
}
