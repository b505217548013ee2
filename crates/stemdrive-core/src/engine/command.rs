//! Lock-free command queue for transport control
//!
//! The control side pushes commands in ~50ns and never blocks; the audio
//! thread pops pending commands at the start of each block. A `Stop` is
//! therefore observed within one block's duration, as the shutdown
//! contract requires. Gains do NOT travel this queue - they go through
//! the `GainBank` so the newest vector always wins.

/// Commands sent from the control side to the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    /// Leave `Idle` and start the playback clock
    Start,
    /// Enter the terminal `Stopped` state
    Stop,
}

/// Create a transport command channel
///
/// 16 slots is plenty: the only traffic is start/stop.
pub fn command_channel() -> (CommandSender, rtrb::Consumer<TransportCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(16);
    (CommandSender { producer }, consumer)
}

/// Command sender for the control side
pub struct CommandSender {
    producer: rtrb::Producer<TransportCommand>,
}

impl CommandSender {
    /// Send a command to the audio thread (non-blocking)
    ///
    /// Returns `Err(cmd)` if the queue is full (command is returned).
    pub fn send(&mut self, cmd: TransportCommand) -> Result<(), TransportCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let (mut tx, mut rx) = command_channel();
        tx.send(TransportCommand::Start).unwrap();
        tx.send(TransportCommand::Stop).unwrap();

        assert_eq!(rx.pop().unwrap(), TransportCommand::Start);
        assert_eq!(rx.pop().unwrap(), TransportCommand::Stop);
        assert!(rx.pop().is_err());
    }
}
