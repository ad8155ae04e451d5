use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const COMMENTARY_CAPACITY: usize = 50;

const COMMENTARY_LINES: &[&str] = &[
    "Patient build-up from the back, looking for an opening.",
    "Great pressing there, the ball is won back high up the pitch.",
    "That's a dangerous cross, but nobody gets on the end of it!",
    "Shot from distance... just wide of the post.",
    "The keeper comes out to claim it confidently.",
    "Free kick awarded after a clumsy challenge in midfield.",
    "Tempo has dropped a little, both sides catching their breath.",
    "Quick switch of play opens up the far side.",
    "Corner kick. Everyone up for this one.",
    "Referee waves play on, the crowd is not happy.",
    "Superb defensive read to cut out that through ball.",
    "Possession stats are heavily one-sided in this spell.",
    "A substitution is being prepared on the touchline.",
    "Offside flag goes up, the attack breaks down.",
    "What a save! Fingertips to push it over the bar.",
];

const HIGHLIGHT_LABELS: &[&str] = &[
    "Goal",
    "Big chance",
    "Great save",
    "Yellow card",
    "Counter attack",
    "Shot off the woodwork",
    "Penalty appeal",
    "Skill move",
];

#[derive(Clone, Debug, PartialEq)]
pub struct CommentaryItem {
    pub minute: u32,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HighlightItem {
    pub label: String,
    pub at: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelEvent {
    Commentary(String),
    Highlight(String),
}

/// Newest-first commentary, bounded.
#[derive(Debug, Default)]
pub struct CommentaryFeed {
    items: VecDeque<CommentaryItem>,
}

impl CommentaryFeed {
    pub fn push(&mut self, item: CommentaryItem) {
        self.items.push_front(item);
        self.items.truncate(COMMENTARY_CAPACITY);
    }

    pub fn items(&self) -> impl Iterator<Item = &CommentaryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct HighlightReel {
    items: Vec<HighlightItem>,
}

impl HighlightReel {
    pub fn push(&mut self, item: HighlightItem) {
        self.items.push(item);
    }

    pub fn get(&self, index: usize) -> Option<&HighlightItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[HighlightItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The two panel timers. Owned by the shell: spawned when it starts and
/// aborted when it goes away.
pub struct PanelTasks {
    handles: Vec<JoinHandle<()>>,
}

impl PanelTasks {
    pub fn spawn(
        commentary_every: Duration,
        highlight_every: Duration,
        tx: mpsc::UnboundedSender<PanelEvent>,
    ) -> Self {
        let commentary = tokio::spawn(run_timer(
            commentary_every,
            COMMENTARY_LINES,
            tx.clone(),
            PanelEvent::Commentary,
        ));
        let highlights = tokio::spawn(run_timer(
            highlight_every,
            HIGHLIGHT_LABELS,
            tx,
            PanelEvent::Highlight,
        ));
        Self {
            handles: vec![commentary, highlights],
        }
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for PanelTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_timer(
    period: Duration,
    lines: &'static [&'static str],
    tx: mpsc::UnboundedSender<PanelEvent>,
    wrap: fn(String) -> PanelEvent,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(line) = pick(lines) else {
            return;
        };
        if tx.send(wrap(line)).is_err() {
            return;
        }
    }
}

fn pick(lines: &[&str]) -> Option<String> {
    let mut rng = rand::thread_rng();
    lines.choose(&mut rng).map(|s| s.to_string())
}
