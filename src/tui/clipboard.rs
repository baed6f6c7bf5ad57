use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;

// One copier thread for the whole process; requests queue through here.
static COPY_TX: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

// How long a clipboard instance stays alive after a copy. On X11 the
// contents vanish with the owning instance, so dropping it immediately
// would lose the caption before a selection manager reads it.
const HOLD_FOR: Duration = Duration::from_secs(2);

fn copier() -> Result<&'static std_mpsc::Sender<String>> {
    COPY_TX.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(HOLD_FOR);
                    }
                }
            }
        });
        tx
    });

    COPY_TX
        .get()
        .ok_or_else(|| anyhow::anyhow!("clipboard thread unavailable"))
}

/// Queue `text` for the system clipboard. Returns once queued; the copier
/// thread performs the copy and holds the instance, so the UI loop never
/// sleeps.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    copier()?
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("clipboard thread stopped"))?;
    Ok(())
}
