//! Outbound path: command batches through the guard to the wire

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tactician_protocol::{ClientCommand, GuardHandle, OutboundMessage};
use tokio::sync::mpsc;

/// Whatever carries wire strings to the server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, line: String) -> Result<()>;
}

/// Transport backed by an unbounded channel; the receiving end owns the socket
#[derive(Clone)]
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new(outgoing: mpsc::UnboundedSender<String>) -> Self {
        Self { outgoing }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, line: String) -> Result<()> {
        self.outgoing
            .send(line)
            .map_err(|_| anyhow::anyhow!("Connection closed"))
    }
}

/// Cloneable handle that guards and sends outbound messages
///
/// Every string passes [`GuardHandle::filter`] before it reaches the transport.
#[derive(Clone)]
pub struct Outbox {
    transport: Arc<dyn Transport>,
    guard: GuardHandle,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>, guard: GuardHandle) -> Self {
        Self { transport, guard }
    }

    pub fn guard(&self) -> &GuardHandle {
        &self.guard
    }

    /// Send the allowed commands of `message`, in order. Returns how many went out.
    pub async fn deliver(&self, message: &OutboundMessage) -> Result<usize> {
        let allowed = self.guard.filter(&message.command_strings());
        for text in &allowed {
            self.transport.send(message.to_wire_format(text)).await?;
        }
        Ok(allowed.len())
    }

    /// `/choose CHOICE|RQID`
    pub async fn choose(&self, room: &str, choice: String, rqid: Option<u64>) -> Result<usize> {
        let message = OutboundMessage::new(room, vec![ClientCommand::Choose(choice)], rqid);
        self.deliver(&message).await
    }

    /// `/team ORDER|RQID`
    pub async fn team(&self, room: &str, order: String, rqid: Option<u64>) -> Result<usize> {
        let message = OutboundMessage::new(room, vec![ClientCommand::Team(order)], rqid);
        self.deliver(&message).await
    }

    pub async fn forfeit(&self, room: &str) -> Result<usize> {
        self.deliver(&OutboundMessage::single(room, ClientCommand::Forfeit))
            .await
    }

    /// Leave a room. Sent from the global room.
    pub async fn leave(&self, room: &str) -> Result<usize> {
        self.deliver(&OutboundMessage::single(
            "",
            ClientCommand::LeaveRoom(room.to_string()),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactician_protocol::GuardMode;

    fn outbox(mode: GuardMode) -> (Outbox, mpsc::UnboundedReceiver<String>) {
        let (transport, rx) = ChannelTransport::channel();
        (Outbox::new(Arc::new(transport), GuardHandle::new(mode)), rx)
    }

    #[tokio::test]
    async fn test_choose_wire_format() {
        let (outbox, mut rx) = outbox(GuardMode::Strict);

        let sent = outbox
            .choose("battle-gen9ou-1", "move flamethrower".to_string(), Some(123))
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            "battle-gen9ou-1|/choose move flamethrower|123"
        );
    }

    #[tokio::test]
    async fn test_guard_drops_chat() {
        let (outbox, mut rx) = outbox(GuardMode::Strict);
        let message = OutboundMessage::new(
            "battle-gen9ou-1",
            vec![
                ClientCommand::Chat("hello opponent".to_string()),
                ClientCommand::Forfeit,
            ],
            None,
        );

        assert_eq!(outbox.deliver(&message).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), "battle-gen9ou-1|/forfeit");
        assert!(rx.try_recv().is_err());

        outbox.guard().set_mode(GuardMode::Disabled);
        assert_eq!(outbox.deliver(&message).await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), "battle-gen9ou-1|hello opponent");
    }

    #[tokio::test]
    async fn test_leave_and_team() {
        let (outbox, mut rx) = outbox(GuardMode::Strict);

        outbox.team("battle-gen9ou-1", "213456".to_string(), Some(4)).await.unwrap();
        outbox.leave("battle-gen9ou-1").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "battle-gen9ou-1|/team 213456|4");
        assert_eq!(rx.recv().await.unwrap(), "|/leave battle-gen9ou-1");
    }

    #[tokio::test]
    async fn test_closed_channel_errors() {
        let (outbox, rx) = outbox(GuardMode::Strict);
        drop(rx);
        assert!(outbox.forfeit("battle-gen9ou-1").await.is_err());
    }
}
