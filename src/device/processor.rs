//! # Command Processor
//!
//! Maps an admitted frame to a reply (or silence) according to the device
//! role, driving persistence, outputs and UI notification through
//! [`DeviceHooks`] on every successful set.

use tracing::{debug, info, warn};

use super::{
    DeviceHooks, DeviceIdentity, DeviceState, OutletState, Output, Role, SwitchVariant,
    UnknownCommandPolicy, KEY_OUTLET_STATUS, KEY_SELECTED_PORT, KEY_VARIANT,
};
use crate::civ::encoder::{encode_extended_nak, encode_nak, encode_reply};
use crate::civ::protocol::{
    Frame, CMD_IDENTIFY, CMD_OUTLET_STATUS, CMD_READ_MODEL, CMD_SELECT_PORT, CMD_VARIANT,
    SUB_ECHO_ADDRESS, SUB_NETWORK_ADDRESS,
};

/// Whether a reply accepts or rejects the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Normal answer or echo of a successful set
    Ack,
    /// Rejection (plain or extended NAK)
    Nak,
}

/// Encoded reply frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Accept or reject
    pub kind: ReplyKind,
    /// Raw frame bytes
    pub bytes: Vec<u8>,
}

impl Reply {
    fn ack(bytes: Vec<u8>) -> Self {
        Self { kind: ReplyKind::Ack, bytes }
    }

    fn nak(bytes: Vec<u8>) -> Self {
        Self { kind: ReplyKind::Nak, bytes }
    }
}

/// Whether a role implements a command
pub fn role_supports(role: Role, command: u8) -> bool {
    match command {
        CMD_IDENTIFY => true,
        CMD_VARIANT | CMD_SELECT_PORT => role == Role::AntennaSwitch,
        CMD_READ_MODEL | CMD_OUTLET_STATUS => role == Role::Outlet,
        _ => false,
    }
}

/// Per-role command dispatcher
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    unknown_command: UnknownCommandPolicy,
    persistence_failures: u64,
}

impl CommandProcessor {
    /// Create a processor with the given unknown-command policy
    pub fn new(unknown_command: UnknownCommandPolicy) -> Self {
        Self {
            unknown_command,
            persistence_failures: 0,
        }
    }

    /// Unknown-command policy in effect
    pub fn unknown_command(&self) -> UnknownCommandPolicy {
        self.unknown_command
    }

    /// Saves that failed since creation
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures
    }

    /// Handle one admitted frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Frame classified as ours or as an accepted broadcast
    /// * `broadcast` - Whether the frame was addressed to 0x00
    /// * `identity` - Our identity
    /// * `state` - Device state, updated in place by set commands
    /// * `hooks` - Host callbacks
    ///
    /// # Returns
    ///
    /// The reply to send, or `None` when the command is answered by silence.
    pub fn process<H: DeviceHooks + ?Sized>(
        &mut self,
        frame: &Frame,
        broadcast: bool,
        identity: &DeviceIdentity,
        state: &mut DeviceState,
        hooks: &mut H,
    ) -> Option<Reply> {
        if !role_supports(identity.role, frame.command) {
            return self.unknown(frame, identity);
        }

        match frame.command {
            CMD_IDENTIFY => self.identify(frame, identity, state),
            CMD_VARIANT => Some(self.variant(frame, broadcast, identity, state, hooks)),
            CMD_SELECT_PORT => Some(self.select_port(frame, identity, state, hooks)),
            CMD_READ_MODEL => Some(Reply::ack(encode_reply(
                frame.from_addr,
                identity.address,
                CMD_READ_MODEL,
                None,
                &[state.model_id],
            ))),
            CMD_OUTLET_STATUS => Some(self.outlet_status(frame, broadcast, identity, state, hooks)),
            _ => self.unknown(frame, identity),
        }
    }

    fn identify(&self, frame: &Frame, identity: &DeviceIdentity, state: &DeviceState) -> Option<Reply> {
        let addr = identity.address;
        match frame.sub_command {
            Some(SUB_ECHO_ADDRESS) => {
                debug!("Echo request from 0x{:02X}", frame.from_addr);
                Some(Reply::ack(encode_reply(
                    frame.from_addr,
                    addr,
                    CMD_IDENTIFY,
                    Some(SUB_ECHO_ADDRESS),
                    &[addr],
                )))
            }
            Some(SUB_NETWORK_ADDRESS) => Some(Reply::ack(encode_reply(
                frame.from_addr,
                addr,
                CMD_IDENTIFY,
                Some(SUB_NETWORK_ADDRESS),
                &state.network_address.octets(),
            ))),
            _ => self.unknown(frame, identity),
        }
    }

    fn variant<H: DeviceHooks + ?Sized>(
        &mut self,
        frame: &Frame,
        broadcast: bool,
        identity: &DeviceIdentity,
        state: &mut DeviceState,
        hooks: &mut H,
    ) -> Reply {
        let (peer, addr) = (frame.from_addr, identity.address);

        let code = match frame.data.as_slice() {
            [] => {
                return Reply::ack(encode_reply(peer, addr, CMD_VARIANT, None, &[state.variant.code()]));
            }
            [code] => *code,
            _ => {
                debug!("Variant set with {} data bytes rejected", frame.data.len());
                return Reply::nak(encode_nak(peer, addr));
            }
        };

        if broadcast {
            debug!("Variant set by broadcast rejected");
            return Reply::nak(encode_nak(peer, addr));
        }

        let Some(variant) = SwitchVariant::from_code(code) else {
            debug!("Unknown switch variant code 0x{:02X}", code);
            return Reply::nak(encode_nak(peer, addr));
        };

        state.variant = variant;
        self.persist(hooks, KEY_VARIANT, variant.code());

        let max_port = variant.port_count() - 1;
        if state.selected_port > max_port {
            state.selected_port = max_port;
            self.persist(hooks, KEY_SELECTED_PORT, max_port);
            hooks.apply_output(Output::AntennaPort(max_port));
        }

        info!("Switch variant set to {:?} ({} ports)", variant, variant.port_count());
        hooks.on_state_changed(state);

        Reply::ack(encode_reply(peer, addr, CMD_VARIANT, None, &[variant.code()]))
    }

    fn select_port<H: DeviceHooks + ?Sized>(
        &mut self,
        frame: &Frame,
        identity: &DeviceIdentity,
        state: &mut DeviceState,
        hooks: &mut H,
    ) -> Reply {
        let (peer, addr) = (frame.from_addr, identity.address);

        let port = match frame.data.as_slice() {
            [] => {
                return Reply::ack(encode_reply(
                    peer,
                    addr,
                    CMD_SELECT_PORT,
                    None,
                    &[state.selected_port_number()],
                ));
            }
            [port] => *port,
            _ => return Reply::nak(encode_nak(peer, addr)),
        };

        if !state.variant.accepts_port(port) {
            debug!(
                "Port {} out of range 1-{} for {:?}",
                port,
                state.variant.port_count(),
                state.variant
            );
            return Reply::nak(encode_nak(peer, addr));
        }

        let index = port - 1;
        state.selected_port = index;
        self.persist(hooks, KEY_SELECTED_PORT, index);
        hooks.apply_output(Output::AntennaPort(index));
        hooks.on_state_changed(state);
        info!("Antenna port {} selected by 0x{:02X}", port, peer);

        Reply::ack(encode_reply(peer, addr, CMD_SELECT_PORT, None, &[port]))
    }

    fn outlet_status<H: DeviceHooks + ?Sized>(
        &mut self,
        frame: &Frame,
        broadcast: bool,
        identity: &DeviceIdentity,
        state: &mut DeviceState,
        hooks: &mut H,
    ) -> Reply {
        let (peer, addr) = (frame.from_addr, identity.address);

        let value = match frame.data.as_slice() {
            [] => {
                return Reply::ack(encode_reply(
                    peer,
                    addr,
                    CMD_OUTLET_STATUS,
                    None,
                    &[state.outlets.status()],
                ));
            }
            [value] => *value,
            _ => return Reply::nak(encode_extended_nak(frame, addr)),
        };

        if broadcast {
            debug!("Outlet set by broadcast rejected");
            return Reply::nak(encode_extended_nak(frame, addr));
        }

        let Some(outlets) = OutletState::from_status(value) else {
            debug!("Outlet status 0x{:02X} out of range", value);
            return Reply::nak(encode_extended_nak(frame, addr));
        };

        state.outlets = outlets;
        self.persist(hooks, KEY_OUTLET_STATUS, value);
        hooks.apply_output(Output::Outlets(outlets));
        hooks.on_state_changed(state);

        Reply::ack(encode_reply(peer, addr, CMD_OUTLET_STATUS, None, &[value]))
    }

    fn unknown(&self, frame: &Frame, identity: &DeviceIdentity) -> Option<Reply> {
        match self.unknown_command {
            UnknownCommandPolicy::Ignore => {
                debug!("Unsupported command 0x{:02X} ignored", frame.command);
                None
            }
            UnknownCommandPolicy::Echo => {
                let sub = frame.sub_command.or_else(|| frame.first_data()).unwrap_or(0x00);
                debug!("Unsupported command 0x{:02X}/0x{:02X}, echoing", frame.command, sub);
                Some(Reply::ack(encode_reply(
                    frame.from_addr,
                    identity.address,
                    frame.command,
                    Some(sub),
                    &[identity.address],
                )))
            }
        }
    }

    fn persist<H: DeviceHooks + ?Sized>(&mut self, hooks: &mut H, key: &str, value: u8) {
        if let Err(e) = hooks.save(key, value) {
            self.persistence_failures += 1;
            warn!("Failed to persist {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDeviceHooks;
    use crate::error::CivError;
    use mockall::predicate::eq;
    use std::net::Ipv4Addr;

    const SWITCH: u8 = 0xB4;
    const OUTLET: u8 = 0xB0;
    const PEER: u8 = 0xEE;

    fn frame(bytes: &[u8]) -> Frame {
        Frame::parse(bytes).unwrap()
    }

    fn run(
        processor: &mut CommandProcessor,
        identity: &DeviceIdentity,
        state: &mut DeviceState,
        hooks: &mut MockDeviceHooks,
        bytes: &[u8],
    ) -> Option<Reply> {
        let f = frame(bytes);
        let broadcast = f.is_broadcast();
        processor.process(&f, broadcast, identity, state, hooks)
    }

    fn switch() -> (CommandProcessor, DeviceIdentity) {
        let identity = DeviceIdentity::new(SWITCH, Role::AntennaSwitch);
        (CommandProcessor::new(Role::AntennaSwitch.default_unknown_command()), identity)
    }

    fn outlet() -> (CommandProcessor, DeviceIdentity) {
        let identity = DeviceIdentity::new(OUTLET, Role::Outlet);
        (CommandProcessor::new(Role::Outlet.default_unknown_command()), identity)
    }

    #[test]
    fn test_identify_echo() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, 0x00, PEER, 0x19, 0x00, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Ack);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x19, 0x00, SWITCH, 0xFD]);
    }

    #[test]
    fn test_identify_network_address() {
        let (mut p, id) = outlet();
        let mut state = DeviceState {
            network_address: Ipv4Addr::new(192, 168, 1, 42),
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x19, 0x01, 0xFD]).unwrap();
        assert_eq!(
            reply.bytes,
            vec![0xFE, 0xFE, PEER, OUTLET, 0x19, 0x01, 192, 168, 1, 42, 0xFD]
        );
    }

    #[test]
    fn test_variant_read() {
        let (mut p, id) = switch();
        let mut state = DeviceState {
            variant: SwitchVariant::Rcs10,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x30, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x30, 0x01, 0xFD]);
    }

    #[test]
    fn test_variant_set_clamps_selection() {
        let (mut p, id) = switch();
        let mut state = DeviceState {
            variant: SwitchVariant::Rcs10,
            selected_port: 7,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();
        hooks
            .expect_save()
            .withf(|key, value| key == KEY_VARIANT && *value == 0x00)
            .times(1)
            .returning(|_, _| Ok(()));
        hooks
            .expect_save()
            .withf(|key, value| key == KEY_SELECTED_PORT && *value == 4)
            .times(1)
            .returning(|_, _| Ok(()));
        hooks
            .expect_apply_output()
            .with(eq(Output::AntennaPort(4)))
            .times(1)
            .return_const(());
        hooks
            .expect_on_state_changed()
            .withf(|s| s.variant == SwitchVariant::Rcs8 && s.selected_port == 4)
            .times(1)
            .return_const(());

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x30, 0x00, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x30, 0x00, 0xFD]);
        assert_eq!(state.selected_port, 4);
    }

    #[test]
    fn test_variant_set_keeps_selection_in_range() {
        let (mut p, id) = switch();
        let mut state = DeviceState {
            selected_port: 2,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();
        hooks.expect_save().times(1).returning(|_, _| Ok(()));
        hooks.expect_apply_output().never();
        hooks.expect_on_state_changed().times(1).return_const(());

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x30, 0x01, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Ack);
        assert_eq!(state.variant, SwitchVariant::Rcs10);
        assert_eq!(state.selected_port, 2);
    }

    #[test]
    fn test_variant_broadcast_set_naks() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, 0x00, PEER, 0x30, 0x01, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0xFA, 0xFD]);
        assert_eq!(state.variant, SwitchVariant::Rcs8);
    }

    #[test]
    fn test_variant_invalid_code_naks() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x30, 0x07, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
    }

    #[test]
    fn test_port_read_is_one_based() {
        let (mut p, id) = switch();
        let mut state = DeviceState {
            selected_port: 2,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x31, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x31, 0x03, 0xFD]);
    }

    #[test]
    fn test_port_six_depends_on_variant() {
        let (mut p, id) = switch();
        let request = [0xFE, 0xFE, SWITCH, PEER, 0x31, 0x06, 0xFD];

        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();
        let reply = run(&mut p, &id, &mut state, &mut hooks, &request).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0xFA, 0xFD]);
        assert_eq!(state.selected_port, 0);

        let mut state = DeviceState {
            variant: SwitchVariant::Rcs10,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();
        hooks
            .expect_save()
            .withf(|key, value| key == KEY_SELECTED_PORT && *value == 5)
            .times(1)
            .returning(|_, _| Ok(()));
        hooks
            .expect_apply_output()
            .with(eq(Output::AntennaPort(5)))
            .times(1)
            .return_const(());
        hooks.expect_on_state_changed().times(1).return_const(());

        let reply = run(&mut p, &id, &mut state, &mut hooks, &request).unwrap();
        assert_eq!(reply.kind, ReplyKind::Ack);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x31, 0x06, 0xFD]);
        assert_eq!(state.selected_port, 5);
    }

    #[test]
    fn test_port_zero_naks() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x31, 0x00, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
    }

    #[test]
    fn test_persistence_failure_still_replies() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();
        hooks
            .expect_save()
            .times(1)
            .returning(|_, _| Err(CivError::Persistence("flash full".to_string())));
        hooks.expect_apply_output().times(1).return_const(());
        hooks.expect_on_state_changed().times(1).return_const(());

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x31, 0x02, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Ack);
        assert_eq!(p.persistence_failures(), 1);
        assert_eq!(state.selected_port, 1);
    }

    #[test]
    fn test_model_read() {
        let (mut p, id) = outlet();
        let mut state = DeviceState {
            model_id: 0x02,
            ..DeviceState::default()
        };
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x34, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, OUTLET, 0x34, 0x02, 0xFD]);
    }

    #[test]
    fn test_outlet_read_and_set() {
        let (mut p, id) = outlet();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x35, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, OUTLET, 0x35, 0x00, 0xFD]);

        let expected = OutletState {
            primary: false,
            secondary: true,
        };
        hooks
            .expect_save()
            .withf(|key, value| key == KEY_OUTLET_STATUS && *value == 0x02)
            .times(1)
            .returning(|_, _| Ok(()));
        hooks
            .expect_apply_output()
            .with(eq(Output::Outlets(expected)))
            .times(1)
            .return_const(());
        hooks.expect_on_state_changed().times(1).return_const(());

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x35, 0x02, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, OUTLET, 0x35, 0x02, 0xFD]);
        assert_eq!(state.outlets, expected);
    }

    #[test]
    fn test_outlet_out_of_range_extended_nak() {
        let (mut p, id) = outlet();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x35, 0x05, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, OUTLET, 0x35, 0x05, 0xFA, 0xFD]);
    }

    #[test]
    fn test_outlet_broadcast_set_extended_nak() {
        let (mut p, id) = outlet();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, 0x00, PEER, 0x35, 0x03, 0xFD]).unwrap();
        assert_eq!(reply.kind, ReplyKind::Nak);
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, OUTLET, 0x35, 0x03, 0xFA, 0xFD]);
        assert_eq!(state.outlets, OutletState::default());
    }

    #[test]
    fn test_unknown_command_ignored_by_outlet() {
        let (mut p, id) = outlet();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        assert!(run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x31, 0x01, 0xFD]).is_none());
        assert!(run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, OUTLET, PEER, 0x03, 0xFD]).is_none());
    }

    #[test]
    fn test_unknown_command_echoed_by_switch() {
        let (mut p, id) = switch();
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x07, 0x12, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x07, 0x12, SWITCH, 0xFD]);

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, SWITCH, PEER, 0x03, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, SWITCH, 0x03, 0x00, SWITCH, 0xFD]);
    }

    #[test]
    fn test_generic_controller_answers_identify_only() {
        let id = DeviceIdentity::new(0xC0, Role::GenericController);
        let mut p = CommandProcessor::new(UnknownCommandPolicy::Ignore);
        let mut state = DeviceState::default();
        let mut hooks = MockDeviceHooks::new();

        let reply = run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, 0x00, PEER, 0x19, 0x00, 0xFD]).unwrap();
        assert_eq!(reply.bytes, vec![0xFE, 0xFE, PEER, 0xC0, 0x19, 0x00, 0xC0, 0xFD]);

        assert!(run(&mut p, &id, &mut state, &mut hooks, &[0xFE, 0xFE, 0xC0, PEER, 0x35, 0x01, 0xFD]).is_none());
    }

    #[test]
    fn test_role_supports() {
        assert!(role_supports(Role::Outlet, CMD_IDENTIFY));
        assert!(role_supports(Role::AntennaSwitch, CMD_SELECT_PORT));
        assert!(!role_supports(Role::Outlet, CMD_SELECT_PORT));
        assert!(role_supports(Role::Outlet, CMD_OUTLET_STATUS));
        assert!(!role_supports(Role::GenericController, CMD_READ_MODEL));
    }
}
