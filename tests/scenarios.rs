//! End-to-end scenarios driven entirely through the public API: a framer
//! decodes/encodes real wire bytes, `update_datastore` answers against a
//! real `SlaveContext`, and the response is re-framed for the wire.

use std::collections::HashMap;

use modbus_core::datastore::block::SequentialBlock;
use modbus_core::datastore::{ServerContext, SlaveContext};
use modbus_core::framer::{AsciiFramer, RtuFramer, TcpFramer, TlsFramer};
use modbus_core::pdu::request::{FC_READ_COILS, FC_READ_HOLDING_REGISTERS};
use modbus_core::pdu::{dispatch, exception::ExceptionCode, Header, Request, RequestPdu, Response};
use modbus_core::{Framer, PduRegistry};
use std::sync::Arc;

fn slave_with_holding_registers(base: u16, values: &[u16]) -> SlaveContext {
    let ctx = SlaveContext::new(
        Box::new(SequentialBlock::<bool>::new(0, 100)),
        Box::new(SequentialBlock::<bool>::new(0, 100)),
        Box::new(SequentialBlock::<u16>::new(0, 200)),
        Box::new(SequentialBlock::<u16>::new(0, 200)),
    )
    .with_zero_mode(true);
    ctx.set_words(FC_READ_HOLDING_REGISTERS, base, values).unwrap();
    ctx
}

/// S1: TCP read holding registers, exact request/response bytes from the
/// public function-code table.
#[test]
fn s1_tcp_read_holding_registers() {
    let framer = TcpFramer::new();
    let request_frame: Vec<u8> = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03];

    let decoded = framer.decode(&request_frame);
    assert_eq!(decoded.consumed, request_frame.len());
    assert_eq!(decoded.transaction_id, 1);
    assert_eq!(decoded.device_id, 0x11);

    let request = Request::decode(decoded.pdu[0], &decoded.pdu[1..]).unwrap();
    let request_pdu = RequestPdu::new(Header::new(decoded.transaction_id, decoded.device_id), request);

    let slave = slave_with_holding_registers(0x6B, &[0xAE41, 0x5652, 0x4340]);
    let response_pdu = dispatch::dispatch(&request_pdu, &slave);

    let out = framer.build_packet(
        &response_pdu.encode(),
        response_pdu.header.device_id,
        response_pdu.header.transaction_id,
    );
    assert_eq!(
        out,
        vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]
    );
}

/// S2: RTU write single coil round-trips through the datastore, and the
/// framed response bytes are identical to the request (write-coil echoes).
#[test]
fn s2_rtu_write_single_coil() {
    let registry = Arc::new(PduRegistry::new(true));
    let framer = RtuFramer::new(registry);
    let request_frame: Vec<u8> = vec![0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00, 0x4E, 0x8B];

    let decoded = framer.decode(&request_frame);
    assert_eq!(decoded.consumed, request_frame.len());

    let request = Request::decode(decoded.pdu[0], &decoded.pdu[1..]).unwrap();
    let request_pdu = RequestPdu::new(Header::new(0, decoded.device_id), request);

    let slave = SlaveContext::new(
        Box::new(SequentialBlock::<bool>::new(0, 200)),
        Box::new(SequentialBlock::<bool>::new(0, 200)),
        Box::new(SequentialBlock::<u16>::new(0, 10)),
        Box::new(SequentialBlock::<u16>::new(0, 10)),
    )
    .with_zero_mode(true);
    let response_pdu = dispatch::dispatch(&request_pdu, &slave);

    let out = framer.build_packet(&response_pdu.encode(), response_pdu.header.device_id, 0);
    assert_eq!(out, request_frame);

    let coil_value = slave.get_values(FC_READ_COILS, 0xAC, 1).unwrap();
    assert_eq!(coil_value, modbus_core::datastore::Values::Bits(vec![true]));
}

/// S3: ASCII read coils frame shape — starts with `:1101`, ends with CRLF.
#[test]
fn s3_ascii_read_coils_frame_shape() {
    let framer = AsciiFramer::new();
    let pdu = vec![FC_READ_COILS, 0x00, 0x13, 0x00, 0x13];
    let frame = framer.encode(&pdu, 0x11, 0);
    let text = String::from_utf8(frame.clone()).unwrap();
    assert!(text.starts_with(":1101"));
    assert!(text.ends_with("\r\n"));

    let decoded = framer.decode(&frame);
    assert_eq!(decoded.consumed, frame.len());
    assert_eq!(decoded.pdu, pdu);
}

/// S4: FC3 with an out-of-range count produces an exception PDU.
#[test]
fn s4_out_of_range_count_is_an_exception() {
    let framer = TcpFramer::new();
    let mut body = vec![FC_READ_HOLDING_REGISTERS];
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&0x0800u16.to_be_bytes());
    let frame = framer.encode(&body, 0x11, 9);

    let decoded = framer.decode(&frame);
    let request = Request::decode(decoded.pdu[0], &decoded.pdu[1..]).unwrap();
    let request_pdu = RequestPdu::new(Header::new(decoded.transaction_id, decoded.device_id), request);
    let slave = slave_with_holding_registers(0, &[0; 10]);
    let response_pdu = dispatch::dispatch(&request_pdu, &slave);

    match response_pdu.body {
        Response::Exception(e) => {
            assert_eq!(e.function_code, FC_READ_HOLDING_REGISTERS);
            assert_eq!(e.exception_code, ExceptionCode::IllegalValue);
            assert_eq!(e.encode(), vec![0x83, 0x03]);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// S5: RTU resync — `DE AD` garbage ahead of a valid frame is consumed one
/// byte at a time before the real frame decodes.
#[test]
fn s5_rtu_resync_over_garbage() {
    let registry = Arc::new(PduRegistry::new(false));
    let framer = RtuFramer::new(registry);
    let valid_frame: Vec<u8> = vec![0x11, 0x05, 0x00, 0xAC, 0xFF, 0x00, 0x4E, 0x8B];
    let mut buffer = vec![0xDE, 0xAD];
    buffer.extend_from_slice(&valid_frame);

    let mut total_consumed = 0;
    let mut steps = 0;
    loop {
        let decoded = framer.decode(&buffer[total_consumed..]);
        assert!(!decoded.is_incomplete(), "decoder should never stall on garbage");
        total_consumed += decoded.consumed;
        steps += 1;
        if !decoded.pdu.is_empty() {
            assert_eq!(decoded.pdu, vec![0x05, 0x00, 0xAC, 0xFF, 0x00]);
            break;
        }
        assert!(steps < 10, "resync should finish well within a handful of steps");
    }
    assert_eq!(steps, 3); // two garbage bytes, then the real frame
    assert_eq!(total_consumed, buffer.len());
}

/// §8 property 1: every framer round-trips a PDU it just encoded.
#[test]
fn framer_round_trip_property_holds_for_every_framer() {
    let pdu = vec![FC_READ_HOLDING_REGISTERS, 0x00, 0x00, 0x00, 0x02];

    let tcp = TcpFramer::new();
    let tcp_frame = tcp.encode(&pdu, 0x11, 7);
    let decoded = tcp.decode(&tcp_frame);
    assert_eq!((decoded.consumed, decoded.device_id, decoded.transaction_id, decoded.pdu), (tcp_frame.len(), 0x11, 7, pdu.clone()));

    let ascii = AsciiFramer::new();
    let ascii_frame = ascii.encode(&pdu, 0x11, 0);
    let decoded = ascii.decode(&ascii_frame);
    assert_eq!((decoded.consumed, decoded.device_id, decoded.pdu), (ascii_frame.len(), 0x11, pdu.clone()));

    // `pdu` here is request-shaped (fc + address + count, no byte count
    // prefix), so the registry must be built server-side to size it right.
    let registry = Arc::new(PduRegistry::new(true));
    let rtu = RtuFramer::new(registry);
    let rtu_frame = rtu.encode(&pdu, 0x11, 0);
    let decoded = rtu.decode(&rtu_frame);
    assert_eq!((decoded.consumed, decoded.device_id, decoded.pdu), (rtu_frame.len(), 0x11, pdu.clone()));

    let tls = TlsFramer::new();
    let tls_frame = tls.encode(&pdu, 0, 0);
    let decoded = tls.decode(&tls_frame);
    assert_eq!(
        (decoded.consumed, decoded.device_id, decoded.transaction_id, decoded.pdu),
        (tls_frame.len(), 0, 0, pdu.clone())
    );
}

/// §8 property 6: a broadcast request reaches every slave and produces no
/// response PDU.
#[test]
fn broadcast_property_reaches_all_slaves_with_no_response() {
    let mut slaves = HashMap::new();
    slaves.insert(1u8, slave_with_holding_registers(0, &[0; 10]));
    slaves.insert(2u8, slave_with_holding_registers(0, &[0; 10]));
    let context = ServerContext::multi(slaves);

    let write = Request::WriteSingleRegister { address: 0, value: 0x77 };
    for slave in context.all() {
        let _ = dispatch::update_datastore(&write, slave);
    }

    for slave in context.all() {
        match dispatch::update_datastore(
            &Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address: 0, count: 1 },
            slave,
        ) {
            Response::ReadRegisters { registers, .. } => assert_eq!(registers, vec![0x77]),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
