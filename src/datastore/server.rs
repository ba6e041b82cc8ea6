//! Server context: maps a device id to a [`SlaveContext`].

use std::collections::HashMap;

use crate::datastore::slave::SlaveContext;
use crate::error::{ModbusError, Result};

/// Either one slave shared by every device id, or a map keyed by device id.
pub enum ServerContext {
    Single(SlaveContext),
    Multi(HashMap<u8, SlaveContext>),
}

impl ServerContext {
    pub fn single(slave: SlaveContext) -> Self {
        Self::Single(slave)
    }

    pub fn multi(slaves: HashMap<u8, SlaveContext>) -> Self {
        Self::Multi(slaves)
    }

    /// Look up the slave context for `device_id`. In `Single` mode this
    /// always succeeds (any device id is answered by the one slave); in
    /// `Multi` mode an absent id yields `NoSuchSlave`.
    pub fn get(&self, device_id: u8) -> Result<&SlaveContext> {
        match self {
            ServerContext::Single(slave) => Ok(slave),
            ServerContext::Multi(slaves) => slaves.get(&device_id).ok_or_else(|| {
                ModbusError::configuration(format!("NoSuchSlave: device id {device_id}"))
            }),
        }
    }

    /// All slave contexts this server currently answers for — used for
    /// broadcast dispatch, which must reach every slave.
    pub fn all(&self) -> Vec<&SlaveContext> {
        match self {
            ServerContext::Single(slave) => vec![slave],
            ServerContext::Multi(slaves) => slaves.values().collect(),
        }
    }

    pub fn insert(&mut self, device_id: u8, slave: SlaveContext) -> Result<()> {
        match self {
            ServerContext::Single(_) => Err(ModbusError::configuration(
                "cannot insert a device id into a single-slave server context",
            )),
            ServerContext::Multi(slaves) => {
                if device_id > 0xF7 {
                    return Err(ModbusError::configuration(format!(
                        "device id {device_id} is out of range (0x00..=0xF7)"
                    )));
                }
                slaves.insert(device_id, slave);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_answers_any_device_id() {
        let ctx = ServerContext::single(SlaveContext::default());
        assert!(ctx.get(1).is_ok());
        assert!(ctx.get(200).is_ok());
    }

    #[test]
    fn multi_rejects_unknown_device_id() {
        let mut slaves = HashMap::new();
        slaves.insert(1u8, SlaveContext::default());
        let ctx = ServerContext::multi(slaves);
        assert!(ctx.get(1).is_ok());
        assert!(ctx.get(2).is_err());
    }
}
