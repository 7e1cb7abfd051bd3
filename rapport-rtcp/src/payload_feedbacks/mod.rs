pub mod picture_loss_indication;
pub mod receiver_estimated_maximum_bitrate;
