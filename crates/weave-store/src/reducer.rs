//! Dynamic reducer contract (§9, "Dynamic reducer contract"): the host supplies a
//! function from command to either a CRDT mutation or "not handled", represented
//! as an explicit tagged variant rather than an `Option<fn>` so the "not handled"
//! case can never be confused with a handled-but-no-op mutation.

use weave_crdt::{MapRef, TransactionMut};

/// One CRDT mutation, deferred until `Repository::mutate_document` opens a
/// transaction for it. Boxed because reducers close over arbitrary command data.
pub type ChangeFn = Box<dyn FnOnce(&MapRef, &mut TransactionMut) + Send>;

/// What a [`Reducer`] returns for one command.
pub enum ReducerOutcome {
	Handled(ChangeFn),
	NotHandled,
}

/// Translates host commands into CRDT mutations. Implementations are typically a
/// `match` over an application-defined command enum; this crate only sees commands
/// as opaque JSON so it stays ignorant of any particular host's command schema.
pub trait Reducer: Send + Sync {
	fn reduce(&self, command: &serde_json::Value) -> ReducerOutcome;
}

#[cfg(test)]
mod tests {
	use super::*;
	use weave_crdt::Any;

	struct SetField;

	impl Reducer for SetField {
		fn reduce(&self, command: &serde_json::Value) -> ReducerOutcome {
			let Some(key) = command.get("setField").and_then(|v| v.as_str()).map(str::to_string) else {
				return ReducerOutcome::NotHandled;
			};
			ReducerOutcome::Handled(Box::new(move |root, txn| {
				root.insert(txn, key, Any::Number(1.0));
			}))
		}
	}

	#[test]
	fn unrecognized_commands_are_not_handled() {
		let reducer = SetField;
		assert!(matches!(reducer.reduce(&serde_json::json!({"other": true})), ReducerOutcome::NotHandled));
	}

	#[test]
	fn recognized_commands_produce_a_change_function() {
		let reducer = SetField;
		assert!(matches!(reducer.reduce(&serde_json::json!({"setField": "x"})), ReducerOutcome::Handled(_)));
	}
}
