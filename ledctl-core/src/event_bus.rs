//! EventBus: typed publish/subscribe fan-out for input events. Used by
//! controllers (rotary encoders, buttons, keyboard), never by the rendering
//! core itself. One subscribe method per event variant so callers never
//! downcast a type-erased payload.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct EncoderEvent {
    pub encoder_id: String,
    pub delta: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ButtonEvent {
    pub button_id: String,
    pub pressed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    pub key: String,
}

pub struct EventBus {
    encoder: broadcast::Sender<EncoderEvent>,
    button: broadcast::Sender<ButtonEvent>,
    keyboard: broadcast::Sender<KeyboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (encoder, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (button, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (keyboard, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { encoder, button, keyboard }
    }

    pub fn subscribe_encoder(&self) -> broadcast::Receiver<EncoderEvent> {
        self.encoder.subscribe()
    }

    pub fn subscribe_button(&self) -> broadcast::Receiver<ButtonEvent> {
        self.button.subscribe()
    }

    pub fn subscribe_keyboard(&self) -> broadcast::Receiver<KeyboardEvent> {
        self.keyboard.subscribe()
    }

    /// Publish is a best-effort fan-out: `send` errors only when there are
    /// no subscribers, which is not a failure worth surfacing.
    pub fn publish_encoder(&self, event: EncoderEvent) {
        let _ = self.encoder.send(event);
    }

    pub fn publish_button(&self, event: ButtonEvent) {
        let _ = self.button.send(event);
    }

    pub fn publish_keyboard(&self, event: KeyboardEvent) {
        let _ = self.keyboard.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_encoder_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_encoder();
        bus.publish_encoder(EncoderEvent { encoder_id: "main".into(), delta: 3 });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.delta, 3);
    }

    #[tokio::test]
    async fn each_event_kind_has_its_own_channel() {
        let bus = EventBus::new();
        let mut encoder_rx = bus.subscribe_encoder();
        bus.publish_button(ButtonEvent { button_id: "power".into(), pressed: true });
        assert!(encoder_rx.try_recv().is_err());
    }
}
