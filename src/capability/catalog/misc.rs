use log::{debug, info};

use crate::{
    capability::{Args, Value},
    device::Device,
    error::RazerResult,
};

pub(super) fn get_serial(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.serial().to_string()))
}

pub(super) fn get_firmware(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.read_text("firmware_version")?))
}

pub(super) fn get_device_name(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.read_text("device_type")?))
}

pub(super) fn get_device_type(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.profile().kind.as_str().to_string()))
}

pub(super) fn get_vid_pid(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    let profile = device.profile();
    Ok(Value::Array(vec![
        Value::I32(i32::from(profile.vid)),
        Value::I32(i32::from(profile.pid)),
    ]))
}

pub(super) fn has_matrix(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Bool(device.profile().has_matrix))
}

/// `[rows, cols]`, or `[-1, -1]` for devices without a matrix.
pub(super) fn get_matrix_dims(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    let (rows, cols) = device
        .profile()
        .matrix
        .map_or((-1, -1), |m| (i32::from(m.rows), i32::from(m.cols)));
    Ok(Value::Array(vec![Value::I32(rows), Value::I32(cols)]))
}

/// Mode and parameter as `mode:param`, e.g. `0:0`.
pub(super) fn get_device_mode(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.read_text("device_mode")?))
}

/// Only normal (0) and driver (3) modes are accepted; the parameter is
/// always written as 0.
pub(super) fn set_device_mode(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let requested = args.u8(0)?;
    let mode = if matches!(requested, 0 | 3) { requested } else { 0 };
    debug!("[{}] device mode {} (requested {})", device.serial(), mode, requested);
    device.write_attribute("device_mode", [mode, 0])?;
    Ok(Value::Unit)
}

pub(super) fn suspend_device(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    info!("Suspending {}", device.serial());
    device.suspend_strategy().suspend(device)?;
    Ok(Value::Unit)
}

pub(super) fn resume_device(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    info!("Resuming {}", device.serial());
    device.suspend_strategy().resume(device)?;
    Ok(Value::Unit)
}
