//! Typed property accessors over a state partition

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::DialogResult;
use crate::state::bot_state::BotState;
use crate::turn::TurnContext;

/// Reads and writes one named property of a `BotState`
pub struct StatePropertyAccessor<T> {
    state: Arc<BotState>,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StatePropertyAccessor<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(state: Arc<BotState>, name: impl Into<String>) -> Self {
        Self {
            state,
            name: name.into(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value, `None` when the property is not set
    pub async fn get(&self, turn: &TurnContext) -> DialogResult<Option<T>> {
        match self.state.get_value(turn, &self.name).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Current value; when missing, `default` is stored and returned
    pub async fn get_or_insert_with<F>(&self, turn: &TurnContext, default: F) -> DialogResult<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get(turn).await? {
            return Ok(value);
        }

        let value = default();
        self.set(turn, &value).await?;
        Ok(value)
    }

    pub async fn set(&self, turn: &TurnContext, value: &T) -> DialogResult<()> {
        let value = serde_json::to_value(value)?;
        self.state.set_value(turn, &self.name, value).await
    }

    pub async fn delete(&self, turn: &TurnContext) -> DialogResult<()> {
        self.state.delete_value(turn, &self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::storage::MemoryStorage;
    use crate::turn::Activity;
    use crate::value_objects::{DialogInstance, DialogState};

    #[tokio::test]
    async fn test_default_is_stored() {
        let state = Arc::new(BotState::conversation(Arc::new(MemoryStorage::new())));
        let turn = TurnContext::new(
            Activity::message("hi")
                .with_channel("test")
                .with_conversation("conv-1"),
        );

        let property = state.create_property::<DialogState>("DialogStateProperty");
        let dialog_state = property
            .get_or_insert_with(&turn, DialogState::default)
            .await
            .unwrap();
        assert!(dialog_state.is_empty());
        assert!(property.get(&turn).await.unwrap().is_some());

        property
            .set(&turn, &DialogState::new(vec![DialogInstance::new("Greet")]))
            .await
            .unwrap();
        let stored = property.get(&turn).await.unwrap().unwrap();
        assert_eq!(stored.active().map(|i| i.dialog_id.as_str()), Some("Greet"));

        property.delete(&turn).await.unwrap();
        assert!(property.get(&turn).await.unwrap().is_none());
    }
}
