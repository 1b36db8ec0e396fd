//! Links between the content surface and the popup.
//!
//! Both directions are fire-and-forget. A closed peer is normal (the popup is
//! only open while the user looks at it), so callers log and move on.

use crate::error::LinkError;
use rowpin_protocol::{CoreRequest, PopupMessage};
use tokio::sync::mpsc;

/// Core -> popup notifications.
pub trait PopupLink: Send {
    fn notify(&self, message: PopupMessage) -> Result<(), LinkError>;
}

/// Popup -> core requests.
pub trait CoreLink: Send {
    fn send(&self, request: CoreRequest) -> Result<(), LinkError>;
}

/// A popup link with nobody listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLink;

impl PopupLink for NullLink {
    fn notify(&self, _message: PopupMessage) -> Result<(), LinkError> {
        Err(LinkError::Closed)
    }
}

impl CoreLink for NullLink {
    fn send(&self, _request: CoreRequest) -> Result<(), LinkError> {
        Err(LinkError::Closed)
    }
}

/// Popup link backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<PopupMessage>,
}

impl ChannelLink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PopupMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PopupLink for ChannelLink {
    fn notify(&self, message: PopupMessage) -> Result<(), LinkError> {
        self.tx.send(message).map_err(|_| LinkError::Closed)
    }
}

impl CoreLink for mpsc::UnboundedSender<CoreRequest> {
    fn send(&self, request: CoreRequest) -> Result<(), LinkError> {
        mpsc::UnboundedSender::send(self, request).map_err(|_| LinkError::Closed)
    }
}

/// Notify the popup, treating a closed popup as a non-event.
pub fn notify_popup(link: &dyn PopupLink, message: PopupMessage) {
    if let Err(e) = link.notify(message) {
        log::debug!("Popup notification {:?} dropped: {}", message, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_link_delivers_until_closed() {
        let (link, mut rx) = ChannelLink::channel();
        link.notify(PopupMessage::PopupShouldRefresh).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PopupMessage::PopupShouldRefresh);

        drop(rx);
        assert_eq!(
            link.notify(PopupMessage::PopupShouldRefresh),
            Err(LinkError::Closed)
        );
        // Swallowed
        notify_popup(&link, PopupMessage::PopupShouldRefresh);
    }

    #[test]
    fn test_core_link_over_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CoreRequest>();
        CoreLink::send(&tx, CoreRequest::RefreshRequested).unwrap();
        assert_eq!(rx.try_recv().unwrap(), CoreRequest::RefreshRequested);
    }
}
