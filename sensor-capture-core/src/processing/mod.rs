pub mod double_buffer;
pub mod frame_queue;
pub mod inertial;
pub mod pcm;
