//! Receive-loop tests against a scripted mock radio.

use std::collections::VecDeque;

use rpi_lora_rx::lora::{LoraConfig, LoraReceiver, Transceiver};
use sx1276_blocking::{HeaderMode, PacketStatus, RxGain};

/// Every driver call the receiver makes, with its arguments.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Begin,
    SetFrequency(u32),
    SetRxGain(RxGain),
    SetSpreadingFactor(u8),
    SetBandwidth(u32),
    SetCodeRate(u8),
    SetHeaderMode(HeaderMode),
    SetPreambleLength(u16),
    SetCrcEnable(bool),
    SetSyncWord(u8),
    Request,
    Wait,
}

#[derive(Debug, Clone)]
struct Delivery {
    payload: VecDeque<u8>,
    rssi: f32,
    snr: f32,
    status: PacketStatus,
}

impl Delivery {
    fn packet(payload: &[u8], rssi: f32, snr: f32) -> Self {
        Self {
            payload: payload.iter().copied().collect(),
            rssi,
            snr,
            status: PacketStatus::RxDone,
        }
    }

    fn failed(status: PacketStatus) -> Self {
        Self {
            payload: VecDeque::new(),
            rssi: -120.0,
            snr: -11.25,
            status,
        }
    }
}

/// Records every call and plays back staged deliveries on `wait`.
struct MockRadio {
    calls: Vec<Call>,
    fail_begin: bool,
    deliveries: VecDeque<Delivery>,
    current: Delivery,
}

impl MockRadio {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_begin: false,
            deliveries: VecDeque::new(),
            current: Delivery::failed(PacketStatus::Standby),
        }
    }

    fn failing_begin() -> Self {
        let mut mock = Self::new();
        mock.fail_begin = true;
        mock
    }

    fn deliver(mut self, delivery: Delivery) -> Self {
        self.deliveries.push_back(delivery);
        self
    }
}

impl Transceiver for MockRadio {
    type Error = String;

    fn begin(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Begin);
        if self.fail_begin {
            Err("no response from the radio".to_string())
        } else {
            Ok(())
        }
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        self.calls.push(Call::SetFrequency(hz));
        Ok(())
    }

    fn set_rx_gain(&mut self, gain: RxGain) -> Result<(), Self::Error> {
        self.calls.push(Call::SetRxGain(gain));
        Ok(())
    }

    fn set_spreading_factor(&mut self, sf: u8) -> Result<(), Self::Error> {
        self.calls.push(Call::SetSpreadingFactor(sf));
        Ok(())
    }

    fn set_bandwidth(&mut self, hz: u32) -> Result<(), Self::Error> {
        self.calls.push(Call::SetBandwidth(hz));
        Ok(())
    }

    fn set_code_rate(&mut self, denominator: u8) -> Result<(), Self::Error> {
        self.calls.push(Call::SetCodeRate(denominator));
        Ok(())
    }

    fn set_header_mode(&mut self, header: HeaderMode) -> Result<(), Self::Error> {
        self.calls.push(Call::SetHeaderMode(header));
        Ok(())
    }

    fn set_preamble_length(&mut self, symbols: u16) -> Result<(), Self::Error> {
        self.calls.push(Call::SetPreambleLength(symbols));
        Ok(())
    }

    fn set_crc_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        self.calls.push(Call::SetCrcEnable(enable));
        Ok(())
    }

    fn set_sync_word(&mut self, word: u8) -> Result<(), Self::Error> {
        self.calls.push(Call::SetSyncWord(word));
        Ok(())
    }

    fn request(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Request);
        self.current = Delivery::failed(PacketStatus::RxWait);
        Ok(())
    }

    fn wait(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Wait);
        self.current = self
            .deliveries
            .pop_front()
            .unwrap_or_else(|| Delivery::failed(PacketStatus::RxTimeout));
        Ok(())
    }

    fn available(&self) -> usize {
        self.current.payload.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.current.payload.pop_front()
    }

    fn packet_rssi(&mut self) -> Result<f32, Self::Error> {
        Ok(self.current.rssi)
    }

    fn snr(&mut self) -> Result<f32, Self::Error> {
        Ok(self.current.snr)
    }

    fn status(&self) -> PacketStatus {
        self.current.status
    }
}

fn run_one(receiver: &mut LoraReceiver<MockRadio>) -> String {
    let mut out = Vec::new();
    receiver.run_once(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn init_applies_the_documented_constants_exactly_once() {
    let mut receiver = LoraReceiver::new(MockRadio::new());
    receiver.init(&LoraConfig::default()).unwrap();

    assert_eq!(
        receiver.radio.calls,
        vec![
            Call::Begin,
            Call::SetFrequency(915_000_000),
            Call::SetRxGain(RxGain::PowerSaving),
            Call::SetSpreadingFactor(9),
            Call::SetBandwidth(125_000),
            Call::SetCodeRate(7),
            Call::SetHeaderMode(HeaderMode::Explicit),
            Call::SetPreambleLength(10),
            Call::SetCrcEnable(true),
            Call::SetSyncWord(0x12),
        ]
    );
}

#[test]
fn failed_begin_aborts_initialization() {
    let mut receiver = LoraReceiver::new(MockRadio::failing_begin());
    assert!(receiver.init(&LoraConfig::default()).is_err());

    // Nothing after the failed begin, and in particular no receive request.
    assert_eq!(receiver.radio.calls, vec![Call::Begin]);
}

#[test]
fn each_iteration_prints_one_received_and_one_status_line() {
    let radio = MockRadio::new().deliver(Delivery::packet(b"hello gateway", -42.25, 9.5));
    let mut receiver = LoraReceiver::new(radio);

    let output = run_one(&mut receiver);
    assert_eq!(
        output,
        "Received: hello gateway\nPacket status: RSSI = -42.25 dBm | SNR = 9.50 dB\n"
    );
}

#[test]
fn crc_error_prints_its_line_and_only_its_line() {
    let radio = MockRadio::new().deliver(Delivery::failed(PacketStatus::CrcError));
    let mut receiver = LoraReceiver::new(radio);

    let output = run_one(&mut receiver);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Received: ");
    assert!(lines[1].starts_with("Packet status: RSSI = "));
    assert_eq!(lines[2], "CRC error");
    assert!(!output.contains("Packet header error"));
}

#[test]
fn header_error_prints_its_line_and_only_its_line() {
    let radio = MockRadio::new().deliver(Delivery::failed(PacketStatus::HeaderError));
    let mut receiver = LoraReceiver::new(radio);

    let output = run_one(&mut receiver);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "Packet header error");
    assert!(!output.contains("CRC error"));
}

#[test]
fn timeout_still_prints_the_line_pair() {
    let radio = MockRadio::new().deliver(Delivery::failed(PacketStatus::RxTimeout));
    let mut receiver = LoraReceiver::new(radio);

    let output = run_one(&mut receiver);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Received: ");
    assert!(lines[1].starts_with("Packet status: RSSI = "));
}

#[test]
fn binary_payloads_are_reported_as_hex() {
    let radio = MockRadio::new().deliver(Delivery::packet(&[0xde, 0xad, 0xbe], -80.0, 2.0));
    let mut receiver = LoraReceiver::new(radio);

    let output = run_one(&mut receiver);
    assert!(output.starts_with("Received: <hex: de ad be>\n"));
}

#[test]
fn the_packet_counter_ignores_failed_attempts() {
    let radio = MockRadio::new()
        .deliver(Delivery::packet(b"one", -50.0, 8.0))
        .deliver(Delivery::failed(PacketStatus::RxTimeout))
        .deliver(Delivery::packet(b"two", -51.0, 7.75));
    let mut receiver = LoraReceiver::new(radio);

    for _ in 0..3 {
        run_one(&mut receiver);
    }
    assert_eq!(receiver.packets_received(), 2);
}
