//! Byte-level packet builders for tests. Fields are written at their wire
//! offsets so the decoder is checked against the layout, not against itself.

use crate::packets::*;

pub fn put_u8(buf: &mut [u8], off: usize, v: u8) {
    buf[off] = v;
}

pub fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

pub fn put_f32(buf: &mut [u8], off: usize, v: f32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub fn header_bytes(format: u16, packet_id: u8, player: u8) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    put_u16(&mut buf, 0, format);
    put_u8(&mut buf, 2, 24);
    put_u8(&mut buf, 3, 1);
    put_u8(&mut buf, 5, 1);
    put_u8(&mut buf, 6, packet_id);
    put_u8(&mut buf, 27, player);
    buf
}

pub fn zeroed_packet(kind: PacketKind, player: u8) -> Vec<u8> {
    let mut buf = header_bytes(PACKET_FORMAT_2024, kind.id(), player);
    buf.resize(kind.packet_size(), 0);
    buf
}

/// Offset of car `index` inside a per-car packet.
pub fn car_offset(kind: PacketKind, index: usize) -> usize {
    let stride = match kind {
        PacketKind::Motion => CAR_MOTION_SIZE,
        PacketKind::LapData => LAP_DATA_SIZE,
        PacketKind::CarTelemetry => CAR_TELEMETRY_SIZE,
        PacketKind::CarStatus => CAR_STATUS_SIZE,
        PacketKind::Session => 0,
    };
    HEADER_SIZE + index * stride
}

pub fn motion_packet(player: u8, x: f32, y: f32, z: f32) -> Vec<u8> {
    let mut buf = zeroed_packet(PacketKind::Motion, player);
    let base = car_offset(PacketKind::Motion, usize::from(player));
    put_f32(&mut buf, base, x);
    put_f32(&mut buf, base + 4, y);
    put_f32(&mut buf, base + 8, z);
    buf
}

pub fn lap_packet(player: u8, lap_num: u8, lap_distance: f32, last_lap_ms: u32) -> Vec<u8> {
    let mut buf = zeroed_packet(PacketKind::LapData, player);
    let base = car_offset(PacketKind::LapData, usize::from(player));
    put_u32(&mut buf, base, last_lap_ms);
    put_f32(&mut buf, base + 20, lap_distance);
    put_u8(&mut buf, base + 33, lap_num);
    buf
}
