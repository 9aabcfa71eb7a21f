//! The four game clocks.
//!
//! Clocks are driven by a periodic tick from the session layer, not by move
//! commits, so a sitting bot keeps draining time. The diagonal-time rule
//! lives here: a seat is "up on time" iff its clock strictly exceeds its
//! diagonal opponent's.

use shared::Seat;

/// Seconds remaining per seat, indexed Human, Bot1, Partner, Bot2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockBank {
    seconds: [f32; 4],
}

fn index(seat: Seat) -> usize {
    match seat {
        Seat::Human => 0,
        Seat::Bot1 => 1,
        Seat::Partner => 2,
        Seat::Bot2 => 3,
    }
}

impl ClockBank {
    pub fn new(initial_s: f32) -> Self {
        ClockBank { seconds: [initial_s; 4] }
    }

    pub fn of(&self, seat: Seat) -> f32 {
        self.seconds[index(seat)]
    }

    pub fn set(&mut self, seat: Seat, seconds: f32) {
        self.seconds[index(seat)] = seconds;
    }

    /// Drain one seat's clock, clamped at zero.
    pub fn tick_seat(&mut self, seat: Seat, dt: f32) {
        let slot = &mut self.seconds[index(seat)];
        *slot = (*slot - dt).max(0.0);
    }

    /// Strictly more time than the diagonal opponent.
    pub fn up_on_time(&self, seat: Seat) -> bool {
        self.of(seat) > self.of(seat.diagonal())
    }

    /// First seat whose flag has fallen, if any.
    pub fn flagged(&self) -> Option<Seat> {
        [Seat::Human, Seat::Bot1, Seat::Partner, Seat::Bot2]
            .into_iter()
            .find(|&seat| self.of(seat) <= 0.0)
    }

    /// Snapshot in protocol order.
    pub fn snapshot(&self) -> [f32; 4] {
        self.seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_on_time_is_strict() {
        let mut clocks = ClockBank::new(300.0);
        assert!(!clocks.up_on_time(Seat::Bot1), "equal clocks are not up");
        clocks.set(Seat::Bot1, 301.0);
        assert!(clocks.up_on_time(Seat::Bot1));
        assert!(!clocks.up_on_time(Seat::Partner), "diagonal is symmetric");
    }

    #[test]
    fn diagonal_is_cross_board() {
        let mut clocks = ClockBank::new(100.0);
        clocks.set(Seat::Bot2, 150.0);
        // Bot2's diagonal is the human, not its board opponent.
        assert!(clocks.up_on_time(Seat::Bot2));
        clocks.set(Seat::Human, 150.0);
        assert!(!clocks.up_on_time(Seat::Bot2));
    }

    #[test]
    fn tick_clamps_at_zero() {
        let mut clocks = ClockBank::new(1.0);
        clocks.tick_seat(Seat::Partner, 2.5);
        assert_eq!(clocks.of(Seat::Partner), 0.0);
        assert_eq!(clocks.flagged(), Some(Seat::Partner));
    }

    #[test]
    fn no_flag_while_everyone_has_time() {
        assert_eq!(ClockBank::new(10.0).flagged(), None);
    }
}
