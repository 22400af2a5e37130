use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::packets::*;

type Reader<'a> = Cursor<&'a [u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("datagram too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unsupported packet format {0}")]
    UnsupportedFormat(u16),
}

/// Decodes one datagram. Checks run in order: header length, packet format, body length.
pub fn decode(buf: &[u8]) -> Result<DecodedPacket, DecodeError> {
    let header = decode_header(buf)?;
    if header.packet_format != PACKET_FORMAT_2024 {
        return Err(DecodeError::UnsupportedFormat(header.packet_format));
    }
    let Some(kind) = PacketKind::from_id(header.packet_id) else {
        return Ok(DecodedPacket::Unhandled { header, packet_id: header.packet_id });
    };

    let needed = kind.packet_size();
    let Some(body) = buf.get(HEADER_SIZE..needed) else {
        return Err(DecodeError::TooShort { needed, actual: buf.len() });
    };
    let mut c = Cursor::new(body);
    // length was checked above, so a failed read here still means truncation
    decode_body(kind, header, &mut c)
        .map_err(|_| DecodeError::TooShort { needed, actual: buf.len() })
}

pub fn decode_header(buf: &[u8]) -> Result<PacketHeader, DecodeError> {
    let too_short = DecodeError::TooShort { needed: HEADER_SIZE, actual: buf.len() };
    let Some(raw) = buf.get(..HEADER_SIZE) else {
        return Err(too_short);
    };
    read_header(&mut Cursor::new(raw)).map_err(|_| too_short)
}

fn decode_body(kind: PacketKind, header: PacketHeader, c: &mut Reader<'_>) -> io::Result<DecodedPacket> {
    let packet = match kind {
        PacketKind::Motion => DecodedPacket::Motion(MotionPacket {
            header,
            cars: read_array(c, read_car_motion)?,
        }),
        PacketKind::Session => DecodedPacket::Session(SessionPacket {
            header,
            session: read_session(c)?,
        }),
        PacketKind::LapData => DecodedPacket::LapData(LapDataPacket {
            header,
            cars: read_array(c, read_lap_data)?,
            time_trial_pb_car_idx: c.read_u8()?,
            time_trial_rival_car_idx: c.read_u8()?,
        }),
        PacketKind::CarTelemetry => DecodedPacket::CarTelemetry(CarTelemetryPacket {
            header,
            cars: read_array(c, read_car_telemetry)?,
            mfd_panel_index: c.read_u8()?,
            mfd_panel_index_secondary_player: c.read_u8()?,
            suggested_gear: c.read_i8()?,
        }),
        PacketKind::CarStatus => DecodedPacket::CarStatus(CarStatusPacket {
            header,
            cars: read_array(c, read_car_status)?,
        }),
    };
    Ok(packet)
}

fn read_array<'a, T, F, const N: usize>(c: &mut Reader<'a>, mut read: F) -> io::Result<[T; N]>
where
    T: Copy + Default,
    F: FnMut(&mut Reader<'a>) -> io::Result<T>,
{
    let mut out = [T::default(); N];
    for slot in out.iter_mut() {
        *slot = read(c)?;
    }
    Ok(out)
}

fn read_bytes<const N: usize>(c: &mut Reader<'_>) -> io::Result<[u8; N]> {
    let mut out = [0u8; N];
    c.read_exact(&mut out)?;
    Ok(out)
}

fn read_header(c: &mut Reader<'_>) -> io::Result<PacketHeader> {
    Ok(PacketHeader {
        packet_format: c.read_u16::<LittleEndian>()?,
        game_year: c.read_u8()?,
        game_major_version: c.read_u8()?,
        game_minor_version: c.read_u8()?,
        packet_version: c.read_u8()?,
        packet_id: c.read_u8()?,
        session_uid: c.read_u64::<LittleEndian>()?,
        session_time: c.read_f32::<LittleEndian>()?,
        frame_identifier: c.read_u32::<LittleEndian>()?,
        overall_frame_identifier: c.read_u32::<LittleEndian>()?,
        player_car_index: c.read_u8()?,
        secondary_player_car_index: c.read_u8()?,
    })
}

fn read_car_motion(c: &mut Reader<'_>) -> io::Result<CarMotionData> {
    Ok(CarMotionData {
        world_position_x: c.read_f32::<LittleEndian>()?,
        world_position_y: c.read_f32::<LittleEndian>()?,
        world_position_z: c.read_f32::<LittleEndian>()?,
        world_velocity_x: c.read_f32::<LittleEndian>()?,
        world_velocity_y: c.read_f32::<LittleEndian>()?,
        world_velocity_z: c.read_f32::<LittleEndian>()?,
        world_forward_dir_x: c.read_i16::<LittleEndian>()?,
        world_forward_dir_y: c.read_i16::<LittleEndian>()?,
        world_forward_dir_z: c.read_i16::<LittleEndian>()?,
        world_right_dir_x: c.read_i16::<LittleEndian>()?,
        world_right_dir_y: c.read_i16::<LittleEndian>()?,
        world_right_dir_z: c.read_i16::<LittleEndian>()?,
        g_force_lateral: c.read_f32::<LittleEndian>()?,
        g_force_longitudinal: c.read_f32::<LittleEndian>()?,
        g_force_vertical: c.read_f32::<LittleEndian>()?,
        yaw: c.read_f32::<LittleEndian>()?,
        pitch: c.read_f32::<LittleEndian>()?,
        roll: c.read_f32::<LittleEndian>()?,
    })
}

fn read_marshal_zone(c: &mut Reader<'_>) -> io::Result<MarshalZone> {
    Ok(MarshalZone {
        zone_start: c.read_f32::<LittleEndian>()?,
        zone_flag: c.read_i8()?,
    })
}

fn read_weather_sample(c: &mut Reader<'_>) -> io::Result<WeatherForecastSample> {
    Ok(WeatherForecastSample {
        session_type: c.read_u8()?,
        time_offset: c.read_u8()?,
        weather: c.read_u8()?,
        track_temperature: c.read_i8()?,
        track_temperature_change: c.read_i8()?,
        air_temperature: c.read_i8()?,
        air_temperature_change: c.read_i8()?,
        rain_percentage: c.read_u8()?,
    })
}

fn read_session(c: &mut Reader<'_>) -> io::Result<SessionData> {
    Ok(SessionData {
        weather: c.read_u8()?,
        track_temperature: c.read_i8()?,
        air_temperature: c.read_i8()?,
        total_laps: c.read_u8()?,
        track_length: c.read_u16::<LittleEndian>()?,
        session_type: c.read_u8()?,
        track_id: c.read_i8()?,
        formula: c.read_u8()?,
        session_time_left: c.read_u16::<LittleEndian>()?,
        session_duration: c.read_u16::<LittleEndian>()?,
        pit_speed_limit: c.read_u8()?,
        game_paused: c.read_u8()?,
        is_spectating: c.read_u8()?,
        spectator_car_index: c.read_u8()?,
        sli_pro_native_support: c.read_u8()?,
        num_marshal_zones: c.read_u8()?,
        marshal_zones: read_array(c, read_marshal_zone)?,
        safety_car_status: c.read_u8()?,
        network_game: c.read_u8()?,
        num_weather_forecast_samples: c.read_u8()?,
        weather_forecast_samples: read_array(c, read_weather_sample)?,
        forecast_accuracy: c.read_u8()?,
        ai_difficulty: c.read_u8()?,
        season_link_identifier: c.read_u32::<LittleEndian>()?,
        weekend_link_identifier: c.read_u32::<LittleEndian>()?,
        session_link_identifier: c.read_u32::<LittleEndian>()?,
        pit_stop_window_ideal_lap: c.read_u8()?,
        pit_stop_window_latest_lap: c.read_u8()?,
        pit_stop_rejoin_position: c.read_u8()?,
        assists: SessionAssists {
            steering_assist: c.read_u8()?,
            braking_assist: c.read_u8()?,
            gearbox_assist: c.read_u8()?,
            pit_assist: c.read_u8()?,
            pit_release_assist: c.read_u8()?,
            ers_assist: c.read_u8()?,
            drs_assist: c.read_u8()?,
            dynamic_racing_line: c.read_u8()?,
            dynamic_racing_line_type: c.read_u8()?,
        },
        game_mode: c.read_u8()?,
        rule_set: c.read_u8()?,
        time_of_day: c.read_u32::<LittleEndian>()?,
        rules: read_session_rules(c)?,
        num_sessions_in_weekend: c.read_u8()?,
        weekend_structure: read_bytes(c)?,
        sector2_lap_distance_start: c.read_f32::<LittleEndian>()?,
        sector3_lap_distance_start: c.read_f32::<LittleEndian>()?,
    })
}

fn read_session_rules(c: &mut Reader<'_>) -> io::Result<SessionRules> {
    let [
        session_length,
        speed_units_lead_player,
        temperature_units_lead_player,
        speed_units_secondary_player,
        temperature_units_secondary_player,
        num_safety_car_periods,
        num_virtual_safety_car_periods,
        num_red_flag_periods,
        equal_car_performance,
        recovery_mode,
        flashback_limit,
        surface_type,
        low_fuel_mode,
        race_starts,
        tyre_temperature,
        pit_lane_tyre_sim,
        car_damage,
        car_damage_rate,
        collisions,
        collisions_off_for_first_lap_only,
        mp_unsafe_pit_release,
        mp_off_for_griefing,
        corner_cutting_stringency,
        parc_ferme_rules,
        pit_stop_experience,
        safety_car,
        safety_car_experience,
        formation_lap,
        formation_lap_experience,
        red_flags,
        affects_licence_level_solo,
        affects_licence_level_mp,
    ] = read_bytes::<32>(c)?;
    Ok(SessionRules {
        session_length,
        speed_units_lead_player,
        temperature_units_lead_player,
        speed_units_secondary_player,
        temperature_units_secondary_player,
        num_safety_car_periods,
        num_virtual_safety_car_periods,
        num_red_flag_periods,
        equal_car_performance,
        recovery_mode,
        flashback_limit,
        surface_type,
        low_fuel_mode,
        race_starts,
        tyre_temperature,
        pit_lane_tyre_sim,
        car_damage,
        car_damage_rate,
        collisions,
        collisions_off_for_first_lap_only,
        mp_unsafe_pit_release,
        mp_off_for_griefing,
        corner_cutting_stringency,
        parc_ferme_rules,
        pit_stop_experience,
        safety_car,
        safety_car_experience,
        formation_lap,
        formation_lap_experience,
        red_flags,
        affects_licence_level_solo,
        affects_licence_level_mp,
    })
}

fn read_lap_data(c: &mut Reader<'_>) -> io::Result<LapData> {
    Ok(LapData {
        last_lap_time_ms: c.read_u32::<LittleEndian>()?,
        current_lap_time_ms: c.read_u32::<LittleEndian>()?,
        sector1_time_ms_part: c.read_u16::<LittleEndian>()?,
        sector1_time_minutes_part: c.read_u8()?,
        sector2_time_ms_part: c.read_u16::<LittleEndian>()?,
        sector2_time_minutes_part: c.read_u8()?,
        delta_to_car_in_front_ms_part: c.read_u16::<LittleEndian>()?,
        delta_to_car_in_front_minutes_part: c.read_u8()?,
        delta_to_race_leader_ms_part: c.read_u16::<LittleEndian>()?,
        delta_to_race_leader_minutes_part: c.read_u8()?,
        lap_distance: c.read_f32::<LittleEndian>()?,
        total_distance: c.read_f32::<LittleEndian>()?,
        safety_car_delta: c.read_f32::<LittleEndian>()?,
        car_position: c.read_u8()?,
        current_lap_num: c.read_u8()?,
        pit_status: c.read_u8()?,
        num_pit_stops: c.read_u8()?,
        sector: c.read_u8()?,
        current_lap_invalid: c.read_u8()?,
        penalties: c.read_u8()?,
        total_warnings: c.read_u8()?,
        corner_cutting_warnings: c.read_u8()?,
        num_unserved_drive_through_pens: c.read_u8()?,
        num_unserved_stop_go_pens: c.read_u8()?,
        grid_position: c.read_u8()?,
        driver_status: c.read_u8()?,
        result_status: c.read_u8()?,
        pit_lane_timer_active: c.read_u8()?,
        pit_lane_time_in_lane_ms: c.read_u16::<LittleEndian>()?,
        pit_stop_timer_ms: c.read_u16::<LittleEndian>()?,
        pit_stop_should_serve_pen: c.read_u8()?,
        speed_trap_fastest_speed: c.read_f32::<LittleEndian>()?,
        speed_trap_fastest_lap: c.read_u8()?,
    })
}

fn read_car_telemetry(c: &mut Reader<'_>) -> io::Result<CarTelemetryData> {
    Ok(CarTelemetryData {
        speed: c.read_u16::<LittleEndian>()?,
        throttle: c.read_f32::<LittleEndian>()?,
        steer: c.read_f32::<LittleEndian>()?,
        brake: c.read_f32::<LittleEndian>()?,
        clutch: c.read_u8()?,
        gear: c.read_i8()?,
        engine_rpm: c.read_u16::<LittleEndian>()?,
        drs: c.read_u8()?,
        rev_lights_percent: c.read_u8()?,
        rev_lights_bit_value: c.read_u16::<LittleEndian>()?,
        brakes_temperature: read_array(c, |c| c.read_u16::<LittleEndian>())?,
        tyres_surface_temperature: read_bytes(c)?,
        tyres_inner_temperature: read_bytes(c)?,
        engine_temperature: c.read_u16::<LittleEndian>()?,
        tyres_pressure: read_array(c, |c| c.read_f32::<LittleEndian>())?,
        surface_type: read_bytes(c)?,
    })
}

fn read_car_status(c: &mut Reader<'_>) -> io::Result<CarStatusData> {
    Ok(CarStatusData {
        traction_control: c.read_u8()?,
        anti_lock_brakes: c.read_u8()?,
        fuel_mix: c.read_u8()?,
        front_brake_bias: c.read_u8()?,
        pit_limiter_status: c.read_u8()?,
        fuel_in_tank: c.read_f32::<LittleEndian>()?,
        fuel_capacity: c.read_f32::<LittleEndian>()?,
        fuel_remaining_laps: c.read_f32::<LittleEndian>()?,
        max_rpm: c.read_u16::<LittleEndian>()?,
        idle_rpm: c.read_u16::<LittleEndian>()?,
        max_gears: c.read_u8()?,
        drs_allowed: c.read_u8()?,
        drs_activation_distance: c.read_u16::<LittleEndian>()?,
        actual_tyre_compound: c.read_u8()?,
        visual_tyre_compound: c.read_u8()?,
        tyres_age_laps: c.read_u8()?,
        vehicle_fia_flags: c.read_i8()?,
        engine_power_ice: c.read_f32::<LittleEndian>()?,
        engine_power_mguk: c.read_f32::<LittleEndian>()?,
        ers_store_energy: c.read_f32::<LittleEndian>()?,
        ers_deploy_mode: c.read_u8()?,
        ers_harvested_this_lap_mguk: c.read_f32::<LittleEndian>()?,
        ers_harvested_this_lap_mguh: c.read_f32::<LittleEndian>()?,
        ers_deployed_this_lap: c.read_f32::<LittleEndian>()?,
        network_paused: c.read_u8()?,
    })
}
