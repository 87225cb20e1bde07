//! `LISTEN`/`NOTIFY`/`UNLISTEN` and draining buffered notifications.
//!
//! `NotificationResponse` can arrive at any point between other messages;
//! `PgConnection::read_message` already siphons it into `self.notifications`
//! (see `driver::connection`), so nothing here touches the network except
//! to issue the `LISTEN`/`NOTIFY`/`UNLISTEN` statement itself.

use qail_core::ast::Command;

use crate::driver::connection::{Notification, PgConnection};
use crate::error::PgResult;

impl PgConnection {
    /// `LISTEN channel`.
    pub fn listen(&mut self, channel: &str) -> PgResult<()> {
        self.execute(&Command::listen(channel))?;
        Ok(())
    }

    /// `NOTIFY channel, 'payload'`.
    pub fn notify(&mut self, channel: &str, payload: &str) -> PgResult<()> {
        self.execute(&Command::notify(channel, payload))?;
        Ok(())
    }

    /// `UNLISTEN channel`.
    pub fn unlisten(&mut self, channel: &str) -> PgResult<()> {
        self.execute(&Command::unlisten(channel))?;
        Ok(())
    }

    /// Pop one buffered notification, if any, without touching the network.
    /// Since this driver is synchronous, notifications only surface when
    /// some other call (`execute`, `fetch_all`, ...) happens to read one off
    /// the wire; call this after such calls to drain what arrived.
    pub fn try_recv_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    /// Drain every buffered notification.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::connection::Notification;
    use std::collections::VecDeque;

    fn sample() -> Notification {
        Notification {
            process_id: 1,
            channel: "events".to_string(),
            payload: "hello".to_string(),
        }
    }

    #[test]
    fn drain_order_is_fifo() {
        let mut queue: VecDeque<Notification> = VecDeque::new();
        queue.push_back(sample());
        queue.push_back(Notification { payload: "world".into(), ..sample() });
        let drained: Vec<_> = queue.drain(..).collect();
        assert_eq!(drained[0].payload, "hello");
        assert_eq!(drained[1].payload, "world");
    }
}
