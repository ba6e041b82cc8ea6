//! Typed client builder (§4.7): one method per function code, each a thin
//! wrapper over [`TransactionManager::execute`] that coerces the response
//! into the value the caller actually wants and turns an exception PDU into
//! an `Err`. Deep range/datastore validation stays server-side in
//! [`crate::pdu::dispatch`]; these methods only do the cheap coercions a
//! caller would find surprising to skip (e.g. turning a bool into the
//! 0xFF00/0x0000 coil convention).

use std::sync::Arc;

use crate::config::ClientDefaults;
use crate::error::{ModbusError, Result};
use crate::framer::Framer;
use crate::pdu::request::{
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
};
use crate::pdu::{FileRecordSubRequest, FileRecordSubWrite, Request, Response};
use crate::transaction::TransactionManager;
use crate::transport::Transport;

/// A Modbus client bound to one transport, framer, and device id.
pub struct Client {
    manager: TransactionManager,
    device_id: u8,
}

impl Client {
    /// Take ownership of `transport` and spawn its reader task. Must be
    /// called from within a running Tokio runtime.
    pub fn new<Tr: Transport + 'static>(transport: Tr, framer: Arc<dyn Framer>, defaults: ClientDefaults) -> Self {
        let device_id = defaults.device_id;
        Self {
            manager: TransactionManager::new(transport, framer, defaults),
            device_id,
        }
    }

    /// Issue `request` against this client's configured device id and
    /// unwrap the response, turning an exception PDU into `Err`.
    async fn call(&self, request: Request) -> Result<Response> {
        self.call_to(self.device_id, request).await
    }

    async fn call_to(&self, device_id: u8, request: Request) -> Result<Response> {
        match self.manager.execute(device_id, request).await? {
            Some(Response::Exception(e)) => Err(ModbusError::modbus(e.function_code, e.exception_code)),
            Some(other) => Ok(other),
            None => Err(ModbusError::protocol("broadcast request produced no response to read")),
        }
    }

    /// Send `request` as a broadcast (device id 0). Requires
    /// `ClientDefaults::broadcast_enable`.
    pub async fn broadcast(&self, request: Request) -> Result<()> {
        self.manager.execute(0, request).await?;
        Ok(())
    }

    pub async fn read_coils(&self, address: u16, count: u16) -> Result<Vec<bool>> {
        let response = self
            .call(Request::ReadBits { function_code: FC_READ_COILS, address, count })
            .await?;
        match response {
            Response::ReadBits { bits, .. } => Ok(bits),
            other => unexpected(other),
        }
    }

    pub async fn read_discrete_inputs(&self, address: u16, count: u16) -> Result<Vec<bool>> {
        let response = self
            .call(Request::ReadBits { function_code: FC_READ_DISCRETE_INPUTS, address, count })
            .await?;
        match response {
            Response::ReadBits { bits, .. } => Ok(bits),
            other => unexpected(other),
        }
    }

    pub async fn read_holding_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let response = self
            .call(Request::ReadRegisters { function_code: FC_READ_HOLDING_REGISTERS, address, count })
            .await?;
        match response {
            Response::ReadRegisters { registers, .. } => Ok(registers),
            other => unexpected(other),
        }
    }

    pub async fn read_input_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let response = self
            .call(Request::ReadRegisters { function_code: FC_READ_INPUT_REGISTERS, address, count })
            .await?;
        match response {
            Response::ReadRegisters { registers, .. } => Ok(registers),
            other => unexpected(other),
        }
    }

    pub async fn write_single_coil(&self, address: u16, value: bool) -> Result<()> {
        self.call(Request::WriteSingleCoil { address, value }).await?;
        Ok(())
    }

    pub async fn write_single_register(&self, address: u16, value: u16) -> Result<()> {
        self.call(Request::WriteSingleRegister { address, value }).await?;
        Ok(())
    }

    pub async fn write_multiple_coils(&self, address: u16, bits: Vec<bool>) -> Result<u16> {
        let count = bits.len() as u16;
        let response = self
            .call(Request::WriteMultipleCoils { address, count, bits })
            .await?;
        match response {
            Response::WriteMultipleCoils { count, .. } => Ok(count),
            other => unexpected(other),
        }
    }

    pub async fn write_multiple_registers(&self, address: u16, registers: Vec<u16>) -> Result<u16> {
        let count = registers.len() as u16;
        let response = self
            .call(Request::WriteMultipleRegisters { address, count, registers })
            .await?;
        match response {
            Response::WriteMultipleRegisters { count, .. } => Ok(count),
            other => unexpected(other),
        }
    }

    pub async fn read_exception_status(&self) -> Result<u8> {
        let response = self.call(Request::ReadExceptionStatus).await?;
        match response {
            Response::ReadExceptionStatus { status } => Ok(status),
            other => unexpected(other),
        }
    }

    pub async fn diagnostics(&self, sub_code: u16, payload: Vec<u8>) -> Result<Vec<u8>> {
        let response = self.call(Request::Diagnostics { sub_code, payload }).await?;
        match response {
            Response::Diagnostics { payload, .. } => Ok(payload),
            other => unexpected(other),
        }
    }

    pub async fn get_comm_event_counter(&self) -> Result<(u16, u16)> {
        let response = self.call(Request::GetCommEventCounter).await?;
        match response {
            Response::GetCommEventCounter { status, count } => Ok((status, count)),
            other => unexpected(other),
        }
    }

    pub async fn get_comm_event_log(&self) -> Result<(u16, u16, u16, Vec<u8>)> {
        let response = self.call(Request::GetCommEventLog).await?;
        match response {
            Response::GetCommEventLog { status, event_count, message_count, events } => {
                Ok((status, event_count, message_count, events))
            }
            other => unexpected(other),
        }
    }

    pub async fn report_slave_id(&self) -> Result<(Vec<u8>, bool)> {
        let response = self.call(Request::ReportSlaveId).await?;
        match response {
            Response::ReportSlaveId { identifier, status } => Ok((identifier, status)),
            other => unexpected(other),
        }
    }

    pub async fn read_file_record(
        &self,
        requests: Vec<FileRecordSubRequest>,
    ) -> Result<Vec<Vec<u16>>> {
        let response = self.call(Request::ReadFileRecord { requests }).await?;
        match response {
            Response::ReadFileRecord { responses } => Ok(responses.into_iter().map(|r| r.data).collect()),
            other => unexpected(other),
        }
    }

    pub async fn write_file_record(&self, requests: Vec<FileRecordSubWrite>) -> Result<()> {
        self.call(Request::WriteFileRecord { requests }).await?;
        Ok(())
    }

    pub async fn mask_write_register(&self, address: u16, and_mask: u16, or_mask: u16) -> Result<()> {
        self.call(Request::MaskWriteRegister { address, and_mask, or_mask }).await?;
        Ok(())
    }

    pub async fn read_write_multiple_registers(
        &self,
        read_address: u16,
        read_count: u16,
        write_address: u16,
        write_registers: Vec<u16>,
    ) -> Result<Vec<u16>> {
        let response = self
            .call(Request::ReadWriteMultipleRegisters {
                read_address,
                read_count,
                write_address,
                write_registers,
            })
            .await?;
        match response {
            Response::ReadWriteMultipleRegisters { registers } => Ok(registers),
            other => unexpected(other),
        }
    }

    pub async fn read_fifo_queue(&self, address: u16) -> Result<Vec<u16>> {
        let response = self.call(Request::ReadFifoQueue { address }).await?;
        match response {
            Response::ReadFifoQueue { values } => Ok(values),
            other => unexpected(other),
        }
    }

    pub async fn read_device_information(
        &self,
        read_code: u8,
        object_id: u8,
    ) -> Result<std::collections::BTreeMap<u8, Vec<u8>>> {
        let response = self
            .call(Request::ReadDeviceInformation { read_code, object_id })
            .await?;
        match response {
            Response::ReadDeviceInformation { objects, .. } => Ok(objects),
            other => unexpected(other),
        }
    }
}

fn unexpected<T>(response: Response) -> Result<T> {
    Err(ModbusError::protocol(format!(
        "unexpected response variant for this request: {response:?}"
    )))
}
