//! Server-side frame loop (§4.6): decode a request frame, route it to the
//! right slave, run it through [`crate::pdu::dispatch`], and write back the
//! framed response — or nothing at all for a broadcast or a listen-only
//! request.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ServerDefaults;
use crate::datastore::ServerContext;
use crate::error::Result;
use crate::framer::Framer;
use crate::pdu::exception::{ExceptionCode, ExceptionResponse};
use crate::pdu::{dispatch as run_dispatch, Header, PduRegistry, Request, RequestPdu, Response, ResponsePdu};
use crate::transport::Transport;

/// Drives one [`Transport`] connection: accumulates bytes, decodes frames
/// with `framer`, answers each against `context`, and writes the framed
/// response back. Runs until the transport reports closed or errors.
pub async fn serve<Tr: Transport>(
    transport: &mut Tr,
    framer: &dyn Framer,
    registry: &PduRegistry,
    context: &ServerContext,
    defaults: &ServerDefaults,
) -> Result<()> {
    let mut buffer = Vec::new();
    while transport.is_open() {
        let chunk = transport.recv().await?;
        if chunk.is_empty() {
            continue;
        }
        buffer.extend_from_slice(&chunk);

        loop {
            let decoded = framer.decode(&buffer);
            if decoded.is_incomplete() {
                break;
            }
            buffer.drain(0..decoded.consumed);
            if decoded.pdu.is_empty() {
                continue;
            }

            let function_code = decoded.pdu[0];
            let request = match registry.decode_request(function_code, &decoded.pdu[1..]) {
                Ok(request) => request,
                Err(e) => {
                    warn!(function_code, error = %e, "dropping malformed request PDU");
                    continue;
                }
            };

            let header = Header::new(decoded.transaction_id, decoded.device_id);
            let request_pdu = RequestPdu::new(header, request);

            if let Some(response_pdu) = handle_request(&request_pdu, context, defaults) {
                if request_pdu.should_respond() {
                    let out = framer.build_packet(
                        &response_pdu.encode(),
                        response_pdu.header.device_id,
                        response_pdu.header.transaction_id,
                    );
                    transport.send(&out).await?;
                    debug!(
                        transaction_id = response_pdu.header.transaction_id,
                        device_id = response_pdu.header.device_id,
                        "response sent"
                    );
                }
            }
        }
    }
    Ok(())
}

/// Route `request` to its slave(s) and produce the response to send, if
/// any. A broadcast (device id 0) is delivered to every slave and never
/// produces a response; neither does any request to a slave currently in
/// listen-only mode, even though it's still dispatched against the
/// datastore.
fn handle_request(
    request: &RequestPdu,
    context: &ServerContext,
    defaults: &ServerDefaults,
) -> Option<ResponsePdu> {
    let device_id = request.header.device_id;

    if device_id == 0 && defaults.broadcast_enable {
        for slave in context.all() {
            let _ = run_dispatch::update_datastore(&request.body, slave);
        }
        debug!("broadcast request applied to all slaves, no response");
        return None;
    }

    match context.get(device_id) {
        Ok(slave) => {
            let response = run_dispatch::dispatch(request, slave);
            if slave.listen_only() {
                debug!(device_id, "device in listen-only mode, response suppressed");
                None
            } else {
                Some(response)
            }
        }
        Err(_) if defaults.ignore_missing_slaves => {
            debug!(device_id, "no such slave, ignoring per ignore_missing_slaves");
            None
        }
        Err(_) => {
            warn!(device_id, "no such slave, replying GatewayNoResponse");
            let function_code = request.body.function_code();
            let body = Response::Exception(ExceptionResponse::new(
                function_code,
                ExceptionCode::GatewayNoResponse,
            ));
            Some(ResponsePdu::new(request.header, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::block::SequentialBlock;
    use crate::datastore::SlaveContext;
    use crate::framer::TcpFramer;
    use crate::pdu::request::{FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_COIL};
    use std::collections::HashMap;

    fn slave_with_registers() -> SlaveContext {
        let ctx = SlaveContext::new(
            Box::new(SequentialBlock::<bool>::new(0, 10)),
            Box::new(SequentialBlock::<bool>::new(0, 10)),
            Box::new(SequentialBlock::<u16>::new(0, 10)),
            Box::new(SequentialBlock::<u16>::new(0, 10)),
        )
        .with_zero_mode(true);
        ctx.set_words(FC_READ_HOLDING_REGISTERS, 0, &[0x2A; 10]).unwrap();
        ctx
    }

    #[test]
    fn single_slave_answers_any_device_id() {
        let context = ServerContext::single(slave_with_registers());
        let defaults = ServerDefaults::default();
        let request = RequestPdu::new(
            Header::new(7, 0x11),
            Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address: 0, count: 2 },
        );
        let response = handle_request(&request, &context, &defaults).unwrap();
        assert_eq!(response.header.transaction_id, 7);
        assert_eq!(response.header.device_id, 0x11);
        match response.body {
            Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0x2A, 0x2A]),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn missing_slave_without_ignore_flag_is_gateway_no_response() {
        let context = ServerContext::multi(HashMap::new());
        let defaults = ServerDefaults::default();
        let request = RequestPdu::new(
            Header::new(1, 0x42),
            Request::WriteSingleCoil { address: 0, value: true },
        );
        let response = handle_request(&request, &context, &defaults).unwrap();
        match response.body {
            Response::Exception(e) => {
                assert_eq!(e.exception_code, ExceptionCode::GatewayNoResponse);
                assert_eq!(e.function_code, FC_WRITE_SINGLE_COIL);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn missing_slave_with_ignore_flag_yields_no_response() {
        let context = ServerContext::multi(HashMap::new());
        let mut defaults = ServerDefaults::default();
        defaults.ignore_missing_slaves = true;
        let request = RequestPdu::new(
            Header::new(1, 0x42),
            Request::WriteSingleCoil { address: 0, value: true },
        );
        assert!(handle_request(&request, &context, &defaults).is_none());
    }

    #[test]
    fn broadcast_reaches_every_slave_and_has_no_response() {
        let mut slaves = HashMap::new();
        slaves.insert(1u8, slave_with_registers());
        slaves.insert(2u8, slave_with_registers());
        let context = ServerContext::multi(slaves);
        let mut defaults = ServerDefaults::default();
        defaults.broadcast_enable = true;
        let request = RequestPdu::new(
            Header::new(1, 0),
            Request::WriteSingleRegister { address: 0, value: 0x99 },
        );
        assert!(handle_request(&request, &context, &defaults).is_none());

        for slave in context.all() {
            let read = run_dispatch::update_datastore(
                &Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address: 0, count: 1 },
                slave,
            );
            match read {
                Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0x99]),
                other => panic!("unexpected response: {other:?}"),
            }
        }
    }

    #[test]
    fn force_listen_only_mode_suppresses_its_own_and_later_responses() {
        use crate::pdu::request::{DIAG_FORCE_LISTEN_ONLY_MODE, FC_WRITE_SINGLE_REGISTER};
        use crate::pdu::Request;

        let context = ServerContext::single(slave_with_registers());
        let defaults = ServerDefaults::default();

        let force_listen_only = RequestPdu::new(
            Header::new(1, 0x11),
            Request::Diagnostics { sub_code: DIAG_FORCE_LISTEN_ONLY_MODE, payload: vec![0, 0] },
        );
        assert!(!force_listen_only.should_respond());
        assert!(handle_request(&force_listen_only, &context, &defaults).is_none());

        // A later, unrelated request is still dispatched against the
        // datastore (the write below must succeed) but the device stays
        // silent: listen-only mode persists past the request that set it.
        let write = RequestPdu::new(
            Header::new(2, 0x11),
            Request::WriteSingleRegister { address: 0, value: 0x7A },
        );
        assert!(write.should_respond());
        assert!(handle_request(&write, &context, &defaults).is_none());

        let slave = context.get(0x11).unwrap();
        assert_eq!(
            slave.get_values(FC_WRITE_SINGLE_REGISTER, 0, 1).unwrap(),
            crate::datastore::Values::Words(vec![0x7A])
        );
    }

    #[test]
    fn tcp_framer_round_trips_a_served_response() {
        let framer = TcpFramer::new();
        let context = ServerContext::single(slave_with_registers());
        let defaults = ServerDefaults::default();
        let request_pdu = {
            let mut buf = vec![FC_READ_HOLDING_REGISTERS];
            buf.extend_from_slice(&0u16.to_be_bytes());
            buf.extend_from_slice(&2u16.to_be_bytes());
            buf
        };
        let frame = framer.encode(&request_pdu, 0x11, 5);
        let decoded = framer.decode(&frame);
        assert_eq!(decoded.consumed, frame.len());

        let request = Request::decode(decoded.pdu[0], &decoded.pdu[1..]).unwrap();
        let request_pdu = RequestPdu::new(Header::new(decoded.transaction_id, decoded.device_id), request);
        let response = handle_request(&request_pdu, &context, &defaults).unwrap();
        let out = framer.build_packet(&response.encode(), response.header.device_id, response.header.transaction_id);
        assert_eq!(out[0..2], 5u16.to_be_bytes());
        assert_eq!(out[6], 0x11);
    }
}

