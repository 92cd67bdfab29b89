use std::rc::Rc;

use crate::net::{RoomId, ViewportFrame};

/// Bound on remembered minimap windows before falling back to a full redraw.
const MAX_PENDING_WINDOWS: usize = 64;

/// Room-space rectangle covered by one frame window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRect {
    pub room: RoomId,
    pub origin: (i32, i32),
    pub size: (i32, i32),
}

impl WindowRect {
    pub fn of(frame: &ViewportFrame) -> Self {
        Self {
            room: frame.room.clone(),
            origin: frame.window_origin(),
            size: frame.window_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinimapWork {
    Overlay(Vec<WindowRect>),
    FullRedraw(RoomId),
}

/// Work accumulated since the last render tick.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub frame: Option<Rc<ViewportFrame>>,
    pub entered_room: Option<RoomId>,
    pub minimap: Option<MinimapWork>,
}

/// Decouples frame arrival from drawing. The viewport only ever needs the
/// newest frame, so older ones are replaced; the minimap still gets every
/// window so no explored strip is skipped.
#[derive(Debug, Default)]
pub struct RenderQueue {
    latest: Option<Rc<ViewportFrame>>,
    entered_room: Option<RoomId>,
    windows: Vec<WindowRect>,
    minimap_redraw: Option<RoomId>,
    coalesced: u64,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_frame(&mut self, frame: Rc<ViewportFrame>) {
        if self.minimap_redraw.is_none() {
            if self.windows.len() < MAX_PENDING_WINDOWS {
                self.windows.push(WindowRect::of(&frame));
            } else {
                self.windows.clear();
                self.minimap_redraw = Some(frame.room.clone());
            }
        }
        if self.latest.replace(frame).is_some() {
            self.coalesced += 1;
        }
    }

    /// The player entered `room`: anything queued for the old room is stale.
    pub fn room_entered(&mut self, room: RoomId) {
        self.latest = None;
        self.windows.clear();
        self.minimap_redraw = Some(room.clone());
        self.entered_room = Some(room);
    }

    pub fn is_dirty(&self) -> bool {
        self.latest.is_some() || self.entered_room.is_some() || self.minimap_redraw.is_some()
    }

    /// Frames replaced before they were drawn.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    pub fn take(&mut self) -> Option<RenderJob> {
        if !self.is_dirty() {
            return None;
        }
        let minimap = match self.minimap_redraw.take() {
            Some(room) => Some(MinimapWork::FullRedraw(room)),
            None if self.windows.is_empty() => None,
            None => Some(MinimapWork::Overlay(std::mem::take(&mut self.windows))),
        };
        Some(RenderJob {
            frame: self.latest.take(),
            entered_room: self.entered_room.take(),
            minimap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(room: &str, x: i32) -> Rc<ViewportFrame> {
        Rc::new(ViewportFrame {
            room: RoomId::new(room),
            x,
            y: 0,
            width: 10,
            height: 10,
            cells: vec![Vec::new()],
        })
    }

    #[test]
    fn latest_frame_wins_and_windows_accumulate() {
        let mut queue = RenderQueue::new();
        queue.submit_frame(frame("A", 1));
        queue.submit_frame(frame("A", 2));
        queue.submit_frame(frame("A", 3));

        let job = queue.take().expect("job");
        assert_eq!(job.frame.map(|frame| frame.x), Some(3));
        let Some(MinimapWork::Overlay(windows)) = job.minimap else {
            panic!("expected overlay work");
        };
        assert_eq!(windows.len(), 3);
        assert_eq!(queue.coalesced(), 2);
        assert!(queue.take().is_none());
    }

    #[test]
    fn room_entry_drops_stale_frames_and_requests_full_redraw() {
        let mut queue = RenderQueue::new();
        queue.submit_frame(frame("A", 1));
        queue.room_entered(RoomId::new("B"));
        queue.submit_frame(frame("B", 4));

        let job = queue.take().expect("job");
        assert_eq!(job.entered_room, Some(RoomId::new("B")));
        assert_eq!(job.frame.map(|frame| frame.room.clone()), Some(RoomId::new("B")));
        assert_eq!(job.minimap, Some(MinimapWork::FullRedraw(RoomId::new("B"))));
    }

    #[test]
    fn overflowing_windows_collapse_into_full_redraw() {
        let mut queue = RenderQueue::new();
        for x in 0..(MAX_PENDING_WINDOWS as i32 + 1) {
            queue.submit_frame(frame("A", x));
        }
        let job = queue.take().expect("job");
        assert_eq!(job.minimap, Some(MinimapWork::FullRedraw(RoomId::new("A"))));
    }
}
