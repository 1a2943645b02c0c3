//! Player-facing messages.

use std::collections::HashMap;

use glam::Vec3;

use crate::config::NotificationConfig;
use crate::entity::EntityId;

/// Keys of every message the spawner can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    ShelterSpawned,
}

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::ShelterSpawned => "ShelterSpawned",
        }
    }
}

/// Chat line or on-screen toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Chat,
    Toast,
}

/// Host message delivery
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: EntityId, key: MessageKey, delivery: Delivery);

    /// Send to every actor within `radius` of `point`
    fn broadcast(&self, point: Vec3, radius: f32, key: MessageKey, delivery: Delivery);
}

/// Localized message texts, falling back to English
#[derive(Debug, Clone)]
pub struct Messages {
    by_lang: HashMap<String, HashMap<MessageKey, String>>,
}

impl Messages {
    pub fn register(&mut self, lang: &str, key: MessageKey, text: impl Into<String>) {
        self.by_lang
            .entry(lang.to_string())
            .or_default()
            .insert(key, text.into());
    }

    pub fn text(&self, lang: &str, key: MessageKey) -> &str {
        self.by_lang
            .get(lang)
            .and_then(|m| m.get(&key))
            .or_else(|| self.by_lang.get("en").and_then(|m| m.get(&key)))
            .map(String::as_str)
            .unwrap_or(key.as_str())
    }
}

impl Default for Messages {
    fn default() -> Self {
        let mut messages = Self {
            by_lang: HashMap::new(),
        };
        messages.register(
            "en",
            MessageKey::ShelterSpawned,
            "A raidable shelter has spawned nearby!",
        );
        messages
    }
}

/// Announce a fresh camp according to the notification settings
pub fn announce_spawn(
    notifier: &dyn Notifier,
    config: &NotificationConfig,
    anchor: EntityId,
    structure_position: Vec3,
) {
    let delivery = if config.as_toast {
        Delivery::Toast
    } else {
        Delivery::Chat
    };

    if config.notify_nearby {
        notifier.broadcast(
            structure_position,
            config.radius,
            MessageKey::ShelterSpawned,
            delivery,
        );
    } else {
        notifier.notify(anchor, MessageKey::ShelterSpawned, delivery);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, Delivery)>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, recipient: EntityId, key: MessageKey, delivery: Delivery) {
            self.sent
                .lock()
                .unwrap()
                .push((format!("{recipient}:{}", key.as_str()), delivery));
        }

        fn broadcast(&self, _point: Vec3, radius: f32, key: MessageKey, delivery: Delivery) {
            self.sent
                .lock()
                .unwrap()
                .push((format!("r{radius}:{}", key.as_str()), delivery));
        }
    }

    #[test]
    fn test_english_fallback() {
        let mut messages = Messages::default();
        messages.register("de", MessageKey::ShelterSpawned, "Ein Unterschlupf ist in der Nähe erschienen!");
        assert_eq!(
            messages.text("fr", MessageKey::ShelterSpawned),
            "A raidable shelter has spawned nearby!"
        );
        assert!(messages.text("de", MessageKey::ShelterSpawned).starts_with("Ein"));
    }

    #[test]
    fn test_announce_only_anchor_by_default() {
        let recorder = Recorder::default();
        let config = NotificationConfig::default();
        announce_spawn(&recorder, &config, EntityId(9), Vec3::ZERO);
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("#9:ShelterSpawned".to_string(), Delivery::Toast)]);
    }

    #[test]
    fn test_announce_nearby_as_chat() {
        let recorder = Recorder::default();
        let config = NotificationConfig {
            notify_nearby: true,
            radius: 40.0,
            as_toast: false,
        };
        announce_spawn(&recorder, &config, EntityId(9), Vec3::ZERO);
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("r40:ShelterSpawned".to_string(), Delivery::Chat)]);
    }
}
