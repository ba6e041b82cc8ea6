//! Client-side transaction manager (§4.5): a transaction id allocator plus
//! an in-flight table, fed by a background task that owns the
//! [`Transport`] exclusively. Requests and responses are genuinely
//! pipelined — several transaction ids can be outstanding at once on the
//! same connection, and a response is matched to its waiter by transaction
//! id (or, for framers that carry none on the wire, by arrival order)
//! regardless of which order the responses come back in.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ClientDefaults;
use crate::error::{ModbusError, Result};
use crate::framer::Framer;
use crate::pdu::{Request, Response};
use crate::transaction::tid::TidGenerator;
use crate::transport::Transport;

type PendingMap = Arc<StdMutex<HashMap<u16, oneshot::Sender<Result<Vec<u8>>>>>>;
type FifoOrder = Arc<StdMutex<VecDeque<u16>>>;
type PendingEcho = Arc<StdMutex<VecDeque<(u16, Vec<u8>)>>>;

pub struct TransactionManager {
    outgoing: mpsc::Sender<Vec<u8>>,
    in_flight: PendingMap,
    fifo_order: FifoOrder,
    pending_echo: PendingEcho,
    tid: TidGenerator,
    framer: Arc<dyn Framer>,
    defaults: ClientDefaults,
}

impl TransactionManager {
    /// Take ownership of `transport` and spawn the task that drives it.
    /// Must be called from within a running Tokio runtime.
    pub fn new<Tr: Transport + 'static>(
        transport: Tr,
        framer: Arc<dyn Framer>,
        defaults: ClientDefaults,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(32);
        let in_flight: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let fifo_order: FifoOrder = Arc::new(StdMutex::new(VecDeque::new()));
        let pending_echo: PendingEcho = Arc::new(StdMutex::new(VecDeque::new()));

        tokio::spawn(run_reader(
            transport,
            framer.clone(),
            outgoing_rx,
            in_flight.clone(),
            fifo_order.clone(),
            pending_echo.clone(),
        ));

        Self {
            outgoing: outgoing_tx,
            in_flight,
            fifo_order,
            pending_echo,
            tid: TidGenerator::new(),
            framer,
            defaults,
        }
    }

    /// Send `body` to `device_id` and, unless this is a broadcast, wait for
    /// its matching response. Returns `Ok(None)` only for a broadcast.
    pub async fn execute(&self, device_id: u8, body: Request) -> Result<Option<Response>> {
        let broadcast = device_id == 0 && self.defaults.broadcast_enable;
        let request_function_code = body.function_code();
        let pdu_bytes = body.encode();

        if broadcast {
            let tid = self.tid.next();
            let frame = self.framer.build_packet(&pdu_bytes, device_id, tid);
            self.send_frame(frame).await?;
            debug!(tid, device_id, "broadcast request sent, no response expected");
            return Ok(None);
        }

        let mut attempts_remaining = self.defaults.retries;
        loop {
            let tid = self.tid.next();
            let frame = self.framer.build_packet(&pdu_bytes, device_id, tid);

            let (tx, rx) = oneshot::channel();
            self.in_flight.lock().unwrap().insert(tid, tx);
            self.fifo_order.lock().unwrap().push_back(tid);
            if self.defaults.handle_local_echo {
                self.pending_echo.lock().unwrap().push_back((tid, frame.clone()));
            }

            self.send_frame(frame).await?;
            debug!(tid, device_id, request_function_code, "request sent");

            match tokio::time::timeout(self.defaults.timeout, rx).await {
                Ok(Ok(Ok(pdu_bytes))) => {
                    let response = Response::decode(pdu_bytes[0], &pdu_bytes[1..])?;
                    return Ok(Some(response));
                }
                Ok(Ok(Err(ModbusError::Protocol(msg)))) if msg.contains("local echo") => {
                    if attempts_remaining == 0 {
                        return Err(ModbusError::protocol(msg));
                    }
                    attempts_remaining -= 1;
                    warn!(tid, attempts_remaining, "retrying after local echo mismatch");
                }
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Err(_closed)) => {
                    return Err(ModbusError::io("transport closed while awaiting response"))
                }
                Err(_elapsed) => {
                    self.in_flight.lock().unwrap().remove(&tid);
                    if attempts_remaining == 0 {
                        return Err(ModbusError::io(format!(
                            "no response to transaction {tid} after {} attempt(s)",
                            self.defaults.retries + 1
                        )));
                    }
                    attempts_remaining -= 1;
                    warn!(tid, attempts_remaining, "response timeout, retrying");
                }
            }
        }
    }

    async fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ModbusError::io("transport reader task has shut down"))
    }
}

/// Background task: owns `transport` exclusively, multiplexing outgoing
/// frames with incoming bytes so several transactions can be in flight at
/// once on the same connection.
async fn run_reader<Tr: Transport>(
    mut transport: Tr,
    framer: Arc<dyn Framer>,
    mut outgoing_rx: mpsc::Receiver<Vec<u8>>,
    in_flight: PendingMap,
    fifo_order: FifoOrder,
    pending_echo: PendingEcho,
) {
    let mut buffer = Vec::new();
    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        if let Err(e) = transport.send(&frame).await {
                            warn!(error = %e, "transport send failed, failing all in-flight transactions");
                            fail_all(&in_flight, e);
                            return;
                        }
                    }
                    None => return,
                }
            }
            received = transport.recv() => {
                match received {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);
                        process_buffer(&mut buffer, &framer, &in_flight, &fifo_order, &pending_echo);
                    }
                    Err(e) => {
                        warn!(error = %e, "transport recv failed, failing all in-flight transactions");
                        fail_all(&in_flight, e);
                        return;
                    }
                }
            }
        }
    }
}

fn process_buffer(
    buffer: &mut Vec<u8>,
    framer: &Arc<dyn Framer>,
    in_flight: &PendingMap,
    fifo_order: &FifoOrder,
    pending_echo: &PendingEcho,
) {
    loop {
        let echo = {
            let mut echoes = pending_echo.lock().unwrap();
            match echoes.front() {
                Some((_, expected)) if buffer.len() >= expected.len() => echoes.pop_front(),
                _ => None,
            }
        };
        if let Some((tid, expected)) = echo {
            let matched = buffer.starts_with(&expected);
            buffer.drain(0..expected.len());
            if !matched {
                warn!(tid, "local echo did not match the transmitted frame");
                if let Some(tx) = in_flight.lock().unwrap().remove(&tid) {
                    let _ = tx.send(Err(ModbusError::protocol("local echo mismatch")));
                }
            }
            continue;
        }

        let decoded = framer.decode(buffer);
        if decoded.is_incomplete() {
            break;
        }
        buffer.drain(0..decoded.consumed);
        if decoded.pdu.is_empty() {
            continue;
        }
        resolve(in_flight, fifo_order, decoded.transaction_id, decoded.pdu);
    }
}

/// Match a decoded frame to its waiting transaction: by transaction id for
/// TCP/TLS, or by arrival order for RTU/ASCII (which carry none on the
/// wire — `transaction_id` is always 0 there).
fn resolve(in_flight: &PendingMap, fifo_order: &FifoOrder, transaction_id: u16, pdu: Vec<u8>) {
    let tid = if transaction_id != 0 {
        let mut order = fifo_order.lock().unwrap();
        order.retain(|&t| t != transaction_id);
        transaction_id
    } else {
        match fifo_order.lock().unwrap().pop_front() {
            Some(t) => t,
            None => {
                warn!("response received with no pending transaction to match it to");
                return;
            }
        }
    };

    match in_flight.lock().unwrap().remove(&tid) {
        Some(tx) => {
            let _ = tx.send(Ok(pdu));
        }
        None => warn!(tid, "dropping response for an unknown or already-resolved transaction"),
    }
}

fn fail_all(in_flight: &PendingMap, err: ModbusError) {
    let mut map = in_flight.lock().unwrap();
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(err.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque as StdVecDeque;
    use std::sync::Mutex as StdTestMutex;

    use async_trait::async_trait;

    use crate::framer::TcpFramer;
    use crate::pdu::request::FC_READ_HOLDING_REGISTERS;

    /// In-memory transport: `recv` replays pre-scripted chunks, `send`
    /// records what was written so a test can assert on it.
    struct ScriptedTransport {
        inbound: StdTestMutex<StdVecDeque<Vec<u8>>>,
        outbound: Arc<StdTestMutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedTransport {
        fn new(inbound: Vec<Vec<u8>>) -> Self {
            Self {
                inbound: StdTestMutex::new(inbound.into()),
                outbound: Arc::new(StdTestMutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.outbound.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Vec<u8>> {
            match self.inbound.lock().unwrap().pop_front() {
                Some(chunk) => Ok(chunk),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    /// A transport whose inbound side is fed live by the test via a
    /// channel, letting a test control exactly when bytes arrive relative
    /// to other transactions being registered.
    struct LiveTransport {
        inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        outbound: Arc<StdTestMutex<Vec<Vec<u8>>>>,
    }

    impl LiveTransport {
        fn new() -> (Self, mpsc::UnboundedSender<Vec<u8>>, Arc<StdTestMutex<Vec<Vec<u8>>>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let outbound = Arc::new(StdTestMutex::new(Vec::new()));
            (Self { inbound_rx: rx, outbound: outbound.clone() }, tx, outbound)
        }
    }

    #[async_trait]
    impl Transport for LiveTransport {
        async fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.outbound.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Vec<u8>> {
            match self.inbound_rx.recv().await {
                Some(chunk) => Ok(chunk),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn read_holding_registers_round_trips_through_tcp() {
        let framer = TcpFramer::new();
        let response_pdu = vec![FC_READ_HOLDING_REGISTERS, 0x02, 0x00, 0x2A];
        let response_frame = framer.encode(&response_pdu, 0x11, 1);
        let transport = ScriptedTransport::new(vec![response_frame]);
        let manager = TransactionManager::new(transport, Arc::new(framer), ClientDefaults::default());

        let request = Request::ReadRegisters {
            function_code: FC_READ_HOLDING_REGISTERS,
            address: 0x6B,
            count: 1,
        };
        let response = manager.execute(0x11, request).await.unwrap().unwrap();
        match response {
            Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0x2A]),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_returns_without_awaiting_a_response() {
        let framer = TcpFramer::new();
        let transport = ScriptedTransport::new(vec![]);
        let mut defaults = ClientDefaults::default();
        defaults.broadcast_enable = true;
        let manager = TransactionManager::new(transport, Arc::new(framer), defaults);

        let request = Request::WriteSingleCoil { address: 0, value: true };
        let response = manager.execute(0, request).await.unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn out_of_order_responses_still_resolve_the_right_waiter() {
        let (transport, inbound_tx, outbound) = LiveTransport::new();
        let framer = Arc::new(TcpFramer::new());
        let manager = Arc::new(TransactionManager::new(transport, framer.clone(), ClientDefaults::default()));

        let m1 = manager.clone();
        let handle_a = tokio::spawn(async move {
            m1.execute(
                0x11,
                Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address: 0, count: 1 },
            )
            .await
        });
        wait_until(|| outbound.lock().unwrap().len() == 1).await;

        let m2 = manager.clone();
        let handle_b = tokio::spawn(async move {
            m2.execute(
                0x11,
                Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address: 2, count: 1 },
            )
            .await
        });
        wait_until(|| outbound.lock().unwrap().len() == 2).await;

        // tid 1 was allocated to request A, tid 2 to request B (allocation
        // happens synchronously before the send that bumped `outbound`).
        // Deliver B's response first to prove ordering doesn't matter.
        let response_b = framer.encode(&[FC_READ_HOLDING_REGISTERS, 0x02, 0x00, 0xBB], 0x11, 2);
        inbound_tx.send(response_b).unwrap();
        let response_a = framer.encode(&[FC_READ_HOLDING_REGISTERS, 0x02, 0x00, 0xAA], 0x11, 1);
        inbound_tx.send(response_a).unwrap();

        let (result_a, result_b) = tokio::join!(handle_a, handle_b);
        match result_a.unwrap().unwrap().unwrap() {
            Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0xAA]),
            other => panic!("unexpected response for A: {other:?}"),
        }
        match result_b.unwrap().unwrap().unwrap() {
            Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0xBB]),
            other => panic!("unexpected response for B: {other:?}"),
        }
    }

    #[test]
    fn allocated_transaction_ids_are_monotonic() {
        let gen = TidGenerator::new();
        assert_eq!(gen.next(), 1);
        assert_eq!(gen.next(), 2);
    }
}
