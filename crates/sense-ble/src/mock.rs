//! Scripted transport for tests.
//!
//! `MockTransport` plays the device: it records every operation, reassembles
//! written commands, and answers each complete command with the next
//! scripted batch of replies. Operations can be made to fail once or to
//! stall forever.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use sense_protocol::{
    Command, FragmentCodec, Response, CHARACTERISTIC_COMMAND_UUID, CHARACTERISTIC_RESPONSE_UUID,
};

use crate::transport::{
    event_channel, CapabilityHandle, EventSink, EventStream, Transport, TransportError,
};

pub(crate) const MOCK_ADDRESS: &str = "C4:7D:11:02:9A:10";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Connect,
    CreateBond,
    RemoveBond,
    Disconnect,
    DiscoverCapabilities,
    EnableNotifications,
    DisableNotifications,
    WriteFragment,
}

/// What the device does after receiving a complete command.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Notify a response, fragmented.
    Respond(Response),
    /// Notify raw fragments.
    Fragments(Vec<Vec<u8>>),
    /// Drop the link.
    Disconnect,
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    ops: Vec<Op>,
    failures: Vec<(Op, TransportError)>,
    stalls: HashSet<Op>,
    capabilities: Vec<CapabilityHandle>,
    codec: FragmentCodec,
    commands: Vec<Command>,
    script: VecDeque<Vec<Reply>>,
}

#[derive(Debug)]
pub(crate) struct MockTransport {
    address: String,
    sink: EventSink,
    state: Mutex<MockState>,
}

/// Split a response the way the device would send it.
pub(crate) fn fragments_of(response: &Response) -> Vec<Vec<u8>> {
    FragmentCodec::new()
        .split(&response.encode().expect("encodable response"))
        .expect("response fits")
        .into_iter()
        .map(|f| f.payload.to_vec())
        .collect()
}

impl MockTransport {
    pub(crate) fn new() -> (Self, EventStream) {
        let (sink, events) = event_channel();
        let mock = Self {
            address: MOCK_ADDRESS.to_string(),
            sink,
            state: Mutex::new(MockState {
                connected: false,
                ops: Vec::new(),
                failures: Vec::new(),
                stalls: HashSet::new(),
                capabilities: vec![
                    CapabilityHandle::new(CHARACTERISTIC_COMMAND_UUID, 0x0e),
                    CapabilityHandle::new(CHARACTERISTIC_RESPONSE_UUID, 0x11),
                ],
                codec: FragmentCodec::new(),
                commands: Vec::new(),
                script: VecDeque::new(),
            }),
        };
        (mock, events)
    }

    /// A mock that is already connected.
    pub(crate) fn connected() -> (Self, EventStream) {
        let (mock, events) = Self::new();
        mock.state.lock().connected = true;
        (mock, events)
    }

    pub(crate) fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.state.lock().ops.iter().filter(|o| **o == op).count()
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.state.lock().commands.clone()
    }

    pub(crate) fn fail_next(&self, op: Op, error: TransportError) {
        self.state.lock().failures.push((op, error));
    }

    pub(crate) fn stall(&self, op: Op) {
        self.state.lock().stalls.insert(op);
    }

    pub(crate) fn set_capabilities(&self, capabilities: Vec<CapabilityHandle>) {
        self.state.lock().capabilities = capabilities;
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Queue the replies to the next command.
    pub(crate) fn script(&self, replies: Vec<Reply>) {
        self.state.lock().script.push_back(replies);
    }

    /// Queue a single response to the next command.
    pub(crate) fn respond(&self, response: Response) {
        self.script(vec![Reply::Respond(response)]);
    }

    async fn begin(&self, op: Op) -> Result<(), TransportError> {
        let (stalled, failure) = {
            let mut state = self.state.lock();
            state.ops.push(op);
            let failure = state
                .failures
                .iter()
                .position(|(o, _)| *o == op)
                .map(|i| state.failures.remove(i).1);
            (state.stalls.contains(&op), failure)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn play(&self, replies: Vec<Reply>) {
        for reply in replies {
            match reply {
                Reply::Respond(response) => {
                    for fragment in fragments_of(&response) {
                        self.sink.notify(fragment);
                    }
                }
                Reply::Fragments(fragments) => {
                    for fragment in fragments {
                        self.sink.notify(fragment);
                    }
                }
                Reply::Disconnect => {
                    self.state.lock().connected = false;
                    self.sink.disconnected(self.address.clone());
                }
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.begin(Op::Connect).await?;
        self.state.lock().connected = true;
        Ok(())
    }

    async fn create_bond(&self) -> Result<(), TransportError> {
        self.begin(Op::CreateBond).await
    }

    async fn remove_bond(&self) -> Result<(), TransportError> {
        self.begin(Op::RemoveBond).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.begin(Op::Disconnect).await?;
        self.state.lock().connected = false;
        self.sink.disconnected(self.address.clone());
        Ok(())
    }

    async fn discover_capabilities(
        &self,
        _service: &str,
    ) -> Result<Vec<CapabilityHandle>, TransportError> {
        self.begin(Op::DiscoverCapabilities).await?;
        Ok(self.state.lock().capabilities.clone())
    }

    async fn enable_notifications(&self, _handle: &CapabilityHandle) -> Result<(), TransportError> {
        self.begin(Op::EnableNotifications).await
    }

    async fn disable_notifications(
        &self,
        _handle: &CapabilityHandle,
    ) -> Result<(), TransportError> {
        self.begin(Op::DisableNotifications).await
    }

    async fn write_fragment(
        &self,
        _handle: &CapabilityHandle,
        fragment: &[u8],
    ) -> Result<(), TransportError> {
        self.begin(Op::WriteFragment).await?;
        let replies = {
            let mut state = self.state.lock();
            let message = state.codec.feed(fragment).expect("well-formed command fragments");
            match message {
                Some(message) => {
                    let command = Command::decode(&message).expect("decodable command");
                    state.commands.push(command);
                    state.script.pop_front()
                }
                None => None,
            }
        };
        if let Some(replies) = replies {
            self.play(replies);
        }
        Ok(())
    }
}
