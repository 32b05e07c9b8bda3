//! Notification consumer
//!
//! Logs every state change the core reports and drives the door status
//! output (high unless the door is closed). A home-automation integration
//! would subscribe here.

use defmt::*;

use portcullis_core::Notification;
use portcullis_hal::OutputPin;
use portcullis_hal_rp2040::gpio::RpOutput;
use portcullis_protocol::DoorState;

use crate::channels::NOTIFY_CHANNEL;

#[embassy_executor::task]
pub async fn notify_task(mut door_status: RpOutput<'static>) {
    info!("Notify task started");

    loop {
        let notification = NOTIFY_CHANNEL.receive().await;
        match notification {
            Notification::CurrentDoorState(state) => {
                info!("Door {:?}", state);
                door_status.set_state(state != DoorState::Closed);
            }
            Notification::TargetDoorState(state) => debug!("Door target {:?}", state),
            Notification::Active => info!("Opener connected"),
            Notification::CurrentLock(locked) => info!("Lock {}", locked),
            Notification::TargetLock(locked) => debug!("Lock target {}", locked),
            Notification::Light(on) => info!("Light {}", on),
            Notification::Motion(detected) => info!("Motion {}", detected),
            Notification::Obstruction(obstructed) => info!("Obstructed {}", obstructed),
            Notification::MotionSensorDiscovered { reboot_required } => {
                info!("Motion sensor discovered, reboot required: {}", reboot_required)
            }
            Notification::RestartRequested(reason) => warn!("Restart requested: {:?}", reason),
        }
    }
}
