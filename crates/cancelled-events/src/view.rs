/*
[INPUT]:  Render channel (active DestinationKind), StoreHandle
[OUTPUT]: Text screens in the log, activation actions when a screen appears
[POS]:    View layer - minimal text stand-in for the destination screens
[UPDATE]: When destinations gain views or appearance hooks
*/

use crate::destination::DestinationKind;
use crate::reducer::Action;
use crate::store::StoreHandle;
use anyhow::{Context, Result};
use tracing::info;

pub fn render(kind: Option<DestinationKind>) -> &'static str {
    match kind {
        None => "",
        Some(DestinationKind::Destination1) => "Destination 1",
        Some(DestinationKind::Destination2) => "Destination 2",
    }
}

/// Action a screen sends when it appears.
pub fn on_appear(kind: DestinationKind) -> Option<Action> {
    match kind {
        DestinationKind::Destination1 => Some(Action::destination1_task()),
        DestinationKind::Destination2 => None,
    }
}

/// Follows the render channel and plays the part of the UI.
#[derive(Debug)]
pub struct ViewHost {
    handle: StoreHandle,
}

impl ViewHost {
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    pub async fn run(self) -> Result<()> {
        let mut render_rx = self.handle.subscribe_render();
        let shutdown = self.handle.shutdown_token();

        let mut current = *render_rx.borrow_and_update();
        self.show(current)?;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = render_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *render_rx.borrow_and_update();
                    if next != current {
                        current = next;
                        self.show(current)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn show(&self, kind: Option<DestinationKind>) -> Result<()> {
        info!(screen = render(kind), "render");
        if let Some(action) = kind.and_then(on_appear) {
            self.handle
                .send(action)
                .context("send appearance action")?;
        }
        Ok(())
    }
}
