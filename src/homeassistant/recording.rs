use super::{MqttPublish, PublishError};
use rumqttc::{ClientError, Publish, QoS, Request};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// In-memory stand-in for the broker connection. Clones share the same log.
#[derive(Clone, Default)]
pub(crate) struct RecordingClient {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    failing_topic: Option<String>,
}

impl RecordingClient {
    pub fn failing_on(topic: &str) -> Self {
        Self {
            failing_topic: Some(topic.to_owned()),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Last retained payload per topic, which is what a subscriber joining later would see.
    pub fn retained(&self) -> HashMap<String, String> {
        self.published()
            .into_iter()
            .filter(|m| m.retain)
            .map(|m| (m.topic, m.payload))
            .collect()
    }
}

impl MqttPublish for RecordingClient {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), PublishError> {
        if self.failing_topic.as_deref() == Some(topic) {
            let request = Request::Publish(Publish::new(topic, QoS::AtLeastOnce, payload));
            return Err(ClientError::TryRequest(request).into());
        }

        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_owned(),
            payload: String::from_utf8(payload).unwrap(),
            retain,
        });
        Ok(())
    }
}
