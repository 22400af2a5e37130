//! F1 24 UDP packet structures (packet format 2024).
//!
//! Every record mirrors the packed little-endian wire layout field for field.
//! Per-car packets carry a fixed `[T; MAX_CARS]` array; the player's entry is
//! selected with [`PacketHeader::player_car_index`].

pub const PACKET_FORMAT_2024: u16 = 2024;
pub const MAX_CARS: usize = 22;
pub const MAX_MARSHAL_ZONES: usize = 21;
pub const MAX_WEATHER_SAMPLES: usize = 64;
pub const MAX_WEEKEND_SESSIONS: usize = 12;

pub const HEADER_SIZE: usize = 29;
pub const CAR_MOTION_SIZE: usize = 60;
pub const MARSHAL_ZONE_SIZE: usize = 5;
pub const WEATHER_SAMPLE_SIZE: usize = 8;
pub const LAP_DATA_SIZE: usize = 57;
pub const CAR_TELEMETRY_SIZE: usize = 60;
pub const CAR_STATUS_SIZE: usize = 55;

pub const MOTION_PACKET_SIZE: usize = HEADER_SIZE + MAX_CARS * CAR_MOTION_SIZE;
pub const SESSION_PACKET_SIZE: usize = 753;
pub const LAP_DATA_PACKET_SIZE: usize = HEADER_SIZE + MAX_CARS * LAP_DATA_SIZE + 2;
pub const CAR_TELEMETRY_PACKET_SIZE: usize = HEADER_SIZE + MAX_CARS * CAR_TELEMETRY_SIZE + 3;
pub const CAR_STATUS_PACKET_SIZE: usize = HEADER_SIZE + MAX_CARS * CAR_STATUS_SIZE;

/// Packet ids this crate decodes. Anything else is reported as unhandled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Motion,
    Session,
    LapData,
    CarTelemetry,
    CarStatus,
}

impl PacketKind {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(PacketKind::Motion),
            1 => Some(PacketKind::Session),
            2 => Some(PacketKind::LapData),
            6 => Some(PacketKind::CarTelemetry),
            7 => Some(PacketKind::CarStatus),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            PacketKind::Motion => 0,
            PacketKind::Session => 1,
            PacketKind::LapData => 2,
            PacketKind::CarTelemetry => 6,
            PacketKind::CarStatus => 7,
        }
    }

    /// Full wire size of the packet, header included.
    pub fn packet_size(self) -> usize {
        match self {
            PacketKind::Motion => MOTION_PACKET_SIZE,
            PacketKind::Session => SESSION_PACKET_SIZE,
            PacketKind::LapData => LAP_DATA_PACKET_SIZE,
            PacketKind::CarTelemetry => CAR_TELEMETRY_PACKET_SIZE,
            PacketKind::CarStatus => CAR_STATUS_PACKET_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PacketHeader {
    pub packet_format: u16,
    pub game_year: u8,
    pub game_major_version: u8,
    pub game_minor_version: u8,
    pub packet_version: u8,
    pub packet_id: u8,
    pub session_uid: u64,
    pub session_time: f32,
    pub frame_identifier: u32,
    pub overall_frame_identifier: u32,
    pub player_car_index: u8,
    pub secondary_player_car_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarMotionData {
    /// World position, metres.
    pub world_position_x: f32,
    pub world_position_y: f32,
    pub world_position_z: f32,
    /// World velocity, metres/s.
    pub world_velocity_x: f32,
    pub world_velocity_y: f32,
    pub world_velocity_z: f32,
    /// Normalised direction vectors, scaled by 32767.
    pub world_forward_dir_x: i16,
    pub world_forward_dir_y: i16,
    pub world_forward_dir_z: i16,
    pub world_right_dir_x: i16,
    pub world_right_dir_y: i16,
    pub world_right_dir_z: i16,
    pub g_force_lateral: f32,
    pub g_force_longitudinal: f32,
    pub g_force_vertical: f32,
    /// Radians.
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPacket {
    pub header: PacketHeader,
    pub cars: [CarMotionData; MAX_CARS],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarshalZone {
    /// Fraction (0..1) of the lap where the zone starts.
    pub zone_start: f32,
    /// -1 invalid, 0 none, 1 green, 2 blue, 3 yellow.
    pub zone_flag: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherForecastSample {
    pub session_type: u8,
    /// Minutes ahead.
    pub time_offset: u8,
    pub weather: u8,
    pub track_temperature: i8,
    pub track_temperature_change: i8,
    pub air_temperature: i8,
    pub air_temperature_change: i8,
    pub rain_percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionAssists {
    pub steering_assist: u8,
    pub braking_assist: u8,
    pub gearbox_assist: u8,
    pub pit_assist: u8,
    pub pit_release_assist: u8,
    pub ers_assist: u8,
    pub drs_assist: u8,
    pub dynamic_racing_line: u8,
    pub dynamic_racing_line_type: u8,
}

/// Lobby and rule settings that follow the assists block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionRules {
    pub session_length: u8,
    pub speed_units_lead_player: u8,
    pub temperature_units_lead_player: u8,
    pub speed_units_secondary_player: u8,
    pub temperature_units_secondary_player: u8,
    pub num_safety_car_periods: u8,
    pub num_virtual_safety_car_periods: u8,
    pub num_red_flag_periods: u8,
    pub equal_car_performance: u8,
    pub recovery_mode: u8,
    pub flashback_limit: u8,
    pub surface_type: u8,
    pub low_fuel_mode: u8,
    pub race_starts: u8,
    pub tyre_temperature: u8,
    pub pit_lane_tyre_sim: u8,
    pub car_damage: u8,
    pub car_damage_rate: u8,
    pub collisions: u8,
    pub collisions_off_for_first_lap_only: u8,
    pub mp_unsafe_pit_release: u8,
    pub mp_off_for_griefing: u8,
    pub corner_cutting_stringency: u8,
    pub parc_ferme_rules: u8,
    pub pit_stop_experience: u8,
    pub safety_car: u8,
    pub safety_car_experience: u8,
    pub formation_lap: u8,
    pub formation_lap_experience: u8,
    pub red_flags: u8,
    pub affects_licence_level_solo: u8,
    pub affects_licence_level_mp: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionData {
    pub weather: u8,
    /// °C.
    pub track_temperature: i8,
    pub air_temperature: i8,
    pub total_laps: u8,
    /// Metres.
    pub track_length: u16,
    pub session_type: u8,
    pub track_id: i8,
    pub formula: u8,
    /// Seconds.
    pub session_time_left: u16,
    pub session_duration: u16,
    /// km/h.
    pub pit_speed_limit: u8,
    pub game_paused: u8,
    pub is_spectating: u8,
    pub spectator_car_index: u8,
    pub sli_pro_native_support: u8,
    pub num_marshal_zones: u8,
    pub marshal_zones: [MarshalZone; MAX_MARSHAL_ZONES],
    pub safety_car_status: u8,
    pub network_game: u8,
    pub num_weather_forecast_samples: u8,
    pub weather_forecast_samples: [WeatherForecastSample; MAX_WEATHER_SAMPLES],
    pub forecast_accuracy: u8,
    pub ai_difficulty: u8,
    pub season_link_identifier: u32,
    pub weekend_link_identifier: u32,
    pub session_link_identifier: u32,
    pub pit_stop_window_ideal_lap: u8,
    pub pit_stop_window_latest_lap: u8,
    pub pit_stop_rejoin_position: u8,
    pub assists: SessionAssists,
    pub game_mode: u8,
    pub rule_set: u8,
    /// Minutes since midnight.
    pub time_of_day: u32,
    pub rules: SessionRules,
    pub num_sessions_in_weekend: u8,
    pub weekend_structure: [u8; MAX_WEEKEND_SESSIONS],
    /// Metres around the lap.
    pub sector2_lap_distance_start: f32,
    pub sector3_lap_distance_start: f32,
}

impl SessionData {
    /// Only the first `num_marshal_zones` entries carry data.
    pub fn active_marshal_zones(&self) -> &[MarshalZone] {
        let n = usize::from(self.num_marshal_zones).min(MAX_MARSHAL_ZONES);
        &self.marshal_zones[..n]
    }

    pub fn active_forecast(&self) -> &[WeatherForecastSample] {
        let n = usize::from(self.num_weather_forecast_samples).min(MAX_WEATHER_SAMPLES);
        &self.weather_forecast_samples[..n]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionPacket {
    pub header: PacketHeader,
    pub session: SessionData,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LapData {
    pub last_lap_time_ms: u32,
    pub current_lap_time_ms: u32,
    pub sector1_time_ms_part: u16,
    pub sector1_time_minutes_part: u8,
    pub sector2_time_ms_part: u16,
    pub sector2_time_minutes_part: u8,
    pub delta_to_car_in_front_ms_part: u16,
    pub delta_to_car_in_front_minutes_part: u8,
    pub delta_to_race_leader_ms_part: u16,
    pub delta_to_race_leader_minutes_part: u8,
    /// Metres into the current lap; negative before the line is first crossed.
    pub lap_distance: f32,
    pub total_distance: f32,
    pub safety_car_delta: f32,
    pub car_position: u8,
    pub current_lap_num: u8,
    pub pit_status: u8,
    pub num_pit_stops: u8,
    pub sector: u8,
    pub current_lap_invalid: u8,
    pub penalties: u8,
    pub total_warnings: u8,
    pub corner_cutting_warnings: u8,
    pub num_unserved_drive_through_pens: u8,
    pub num_unserved_stop_go_pens: u8,
    pub grid_position: u8,
    pub driver_status: u8,
    pub result_status: u8,
    pub pit_lane_timer_active: u8,
    pub pit_lane_time_in_lane_ms: u16,
    pub pit_stop_timer_ms: u16,
    pub pit_stop_should_serve_pen: u8,
    /// km/h.
    pub speed_trap_fastest_speed: f32,
    /// 255 when not set.
    pub speed_trap_fastest_lap: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapDataPacket {
    pub header: PacketHeader,
    pub cars: [LapData; MAX_CARS],
    pub time_trial_pb_car_idx: u8,
    pub time_trial_rival_car_idx: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarTelemetryData {
    /// km/h.
    pub speed: u16,
    pub throttle: f32,
    pub steer: f32,
    pub brake: f32,
    pub clutch: u8,
    pub gear: i8,
    pub engine_rpm: u16,
    pub drs: u8,
    pub rev_lights_percent: u8,
    pub rev_lights_bit_value: u16,
    /// °C, RL RR FL FR.
    pub brakes_temperature: [u16; 4],
    pub tyres_surface_temperature: [u8; 4],
    pub tyres_inner_temperature: [u8; 4],
    pub engine_temperature: u16,
    /// PSI.
    pub tyres_pressure: [f32; 4],
    pub surface_type: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarTelemetryPacket {
    pub header: PacketHeader,
    pub cars: [CarTelemetryData; MAX_CARS],
    /// 255 when the MFD is closed.
    pub mfd_panel_index: u8,
    pub mfd_panel_index_secondary_player: u8,
    pub suggested_gear: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarStatusData {
    pub traction_control: u8,
    pub anti_lock_brakes: u8,
    pub fuel_mix: u8,
    pub front_brake_bias: u8,
    pub pit_limiter_status: u8,
    /// kg.
    pub fuel_in_tank: f32,
    pub fuel_capacity: f32,
    pub fuel_remaining_laps: f32,
    pub max_rpm: u16,
    pub idle_rpm: u16,
    pub max_gears: u8,
    pub drs_allowed: u8,
    pub drs_activation_distance: u16,
    pub actual_tyre_compound: u8,
    pub visual_tyre_compound: u8,
    pub tyres_age_laps: u8,
    pub vehicle_fia_flags: i8,
    /// Watts.
    pub engine_power_ice: f32,
    pub engine_power_mguk: f32,
    /// Joules.
    pub ers_store_energy: f32,
    pub ers_deploy_mode: u8,
    pub ers_harvested_this_lap_mguk: f32,
    pub ers_harvested_this_lap_mguh: f32,
    pub ers_deployed_this_lap: f32,
    pub network_paused: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarStatusPacket {
    pub header: PacketHeader,
    pub cars: [CarStatusData; MAX_CARS],
}

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum DecodedPacket {
    Motion(MotionPacket),
    Session(SessionPacket),
    LapData(LapDataPacket),
    CarTelemetry(CarTelemetryPacket),
    CarStatus(CarStatusPacket),
    /// Valid 2024 header with a packet id this crate does not consume.
    Unhandled { header: PacketHeader, packet_id: u8 },
}

impl DecodedPacket {
    pub fn header(&self) -> &PacketHeader {
        match self {
            DecodedPacket::Motion(p) => &p.header,
            DecodedPacket::Session(p) => &p.header,
            DecodedPacket::LapData(p) => &p.header,
            DecodedPacket::CarTelemetry(p) => &p.header,
            DecodedPacket::CarStatus(p) => &p.header,
            DecodedPacket::Unhandled { header, .. } => header,
        }
    }

    pub fn kind(&self) -> Option<PacketKind> {
        match self {
            DecodedPacket::Motion(_) => Some(PacketKind::Motion),
            DecodedPacket::Session(_) => Some(PacketKind::Session),
            DecodedPacket::LapData(_) => Some(PacketKind::LapData),
            DecodedPacket::CarTelemetry(_) => Some(PacketKind::CarTelemetry),
            DecodedPacket::CarStatus(_) => Some(PacketKind::CarStatus),
            DecodedPacket::Unhandled { .. } => None,
        }
    }
}
