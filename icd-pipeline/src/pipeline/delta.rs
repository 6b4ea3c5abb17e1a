// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Switching between two pipelines with as few commands as possible.
//!
//! Binding a pipeline replays its whole [`CommandStream`]. When the pipeline that was bound
//! before is known, most of that state is already programmed. A [`PipelineDelta`] holds only the
//! packets of the new pipeline that program something differently from the old one, so that
//! replaying the full stream of the old pipeline then the delta leaves the hardware in the same
//! state as replaying the full stream of the new pipeline.

use super::{
    command_stream::{CommandStream, Packet},
    Pipeline,
};
use crate::{
    device::{Device, DeviceOwned},
    macros::impl_id_counter,
    DriverObject, Handle, ObjectType,
};
use smallvec::SmallVec;
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    num::NonZero,
    sync::Arc,
};

/// The commands that switch the hardware from one pipeline to another.
#[derive(Debug)]
pub struct PipelineDelta {
    device: Arc<Device>,
    id: NonZero<u64>,
    packets: SmallVec<[Packet; 16]>,
    commands: CommandStream,
}

impl PipelineDelta {
    /// Computes the commands needed to switch from `from` to `to`.
    ///
    /// If both pipelines program the same state and need the same errata flushes, the delta is
    /// empty. Otherwise it contains every state packet of `to` that `from` does not emit
    /// identically, surrounded by the errata flushes of `to`.
    pub fn new(
        from: &Arc<Pipeline>,
        to: &Arc<Pipeline>,
    ) -> Result<Arc<PipelineDelta>, PipelineDeltaError> {
        if !Arc::ptr_eq(from.device(), to.device()) {
            return Err(PipelineDeltaError::DeviceMismatch);
        }

        let changed = |packet: &&Packet| {
            !from
                .packets()
                .iter()
                .any(|old| old.kind() == packet.kind() && old.words() == packet.words())
        };

        let state_changed = from.workarounds() != to.workarounds()
            || to
                .packets()
                .iter()
                .filter(|packet| !packet.kind().is_workaround())
                .any(|packet| changed(&packet));

        let packets: SmallVec<[Packet; 16]> = if state_changed {
            to.packets()
                .iter()
                .filter(|packet| packet.kind().is_workaround() || changed(packet))
                .cloned()
                .collect()
        } else {
            SmallVec::new()
        };
        let commands = CommandStream::from_packets(&packets);

        let delta = Arc::new(PipelineDelta {
            device: to.device().clone(),
            id: Self::next_id(),
            packets,
            commands,
        });

        log::debug!(
            "pipeline delta {:?} -> {:?}: {} of {} command words",
            from.handle(),
            to.handle(),
            delta.commands.len(),
            to.commands().len(),
        );

        Ok(delta)
    }

    /// Returns the commands to replay after the commands of the old pipeline.
    #[inline]
    pub fn commands(&self) -> &CommandStream {
        &self.commands
    }

    #[inline]
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Returns whether the two pipelines program the same state.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl DriverObject for PipelineDelta {
    #[inline]
    fn object_type(&self) -> ObjectType {
        ObjectType::PipelineDelta
    }

    #[inline]
    fn handle(&self) -> Handle {
        Handle::new(self.id)
    }
}

impl DeviceOwned for PipelineDelta {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(PipelineDelta);

/// Error that can happen when computing a [`PipelineDelta`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineDeltaError {
    /// The two pipelines were created on different devices.
    DeviceMismatch,
}

impl Error for PipelineDeltaError {}

impl Display for PipelineDeltaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::DeviceMismatch => {
                write!(f, "the pipelines do not belong to the same device")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineDelta, PipelineDeltaError};
    use crate::{
        pipeline::{
            command_stream::{command_opcode, CommandStream, PacketKind, PIPE_CONTROL_OPCODE},
            compute::ComputePipelineCreateInfo,
            input_assembly::{InputAssemblyState, PrimitiveTopology},
            rasterization::SampleCount,
            viewport::{Scissor, ViewportState},
            Pipeline,
        },
        DriverObject, ObjectType,
    };
    use foldhash::HashMap;
    use smallvec::smallvec;
    use std::sync::Arc;

    /// The value of every register a stream programs, keyed by command. Flushes program nothing.
    fn registers(streams: &[&CommandStream]) -> HashMap<u32, Vec<u32>> {
        let mut registers = HashMap::default();

        for stream in streams {
            let mut words = stream.words();

            while let [header, ..] = *words {
                let len = (header & 0xff) as usize + 2;
                let opcode = command_opcode(header);

                if opcode != PIPE_CONTROL_OPCODE {
                    registers.insert(opcode, words[..len].to_vec());
                }

                words = &words[len..];
            }
        }

        registers
    }

    fn assert_switches(from: &Arc<Pipeline>, to: &Arc<Pipeline>) {
        let delta = PipelineDelta::new(from, to).unwrap();

        assert_eq!(
            registers(&[from.commands(), delta.commands()]),
            registers(&[from.commands(), to.commands()]),
        );
        assert!(delta.commands().len() <= to.commands().len());
    }

    #[test]
    fn same_pipeline() {
        let device = test_device!();
        let pipeline = Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();
        let twin = Pipeline::new_graphics(device, triangle_pipeline_info!()).unwrap();

        let delta = PipelineDelta::new(&pipeline, &pipeline).unwrap();
        assert!(delta.is_empty());
        assert!(delta.packets().is_empty());
        assert_eq!(delta.object_type(), ObjectType::PipelineDelta);

        assert!(PipelineDelta::new(&pipeline, &twin).unwrap().is_empty());
    }

    #[test]
    fn different_state() {
        for device in [
            test_device!(Gen6, 0),
            test_device!(Gen7, 2),
            test_device!(Gen7_5, 0),
        ] {
            let triangles =
                Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();

            let mut create_info = triangle_pipeline_info!();
            create_info.input_assembly_state = InputAssemblyState {
                primitive_restart_index: 0xffff,
                ..InputAssemblyState::new()
                    .topology(PrimitiveTopology::TriangleStrip)
                    .primitive_restart_enable()
            };
            create_info.viewport_state = ViewportState {
                scissors: smallvec![Scissor::default()],
                ..ViewportState::new()
            };
            create_info.multisample_state.rasterization_samples = SampleCount::Sample4;
            create_info.color_blend_state.attachments.clear();
            create_info.stages[1].shader.interface.resource_count = 1;
            let strips = Pipeline::new_graphics(device.clone(), create_info).unwrap();

            assert_switches(&triangles, &strips);
            assert_switches(&strips, &triangles);

            let delta = PipelineDelta::new(&triangles, &strips).unwrap();
            assert!(!delta.is_empty());
            assert!(delta.commands().len() < strips.commands().len());
        }
    }

    #[test]
    fn different_workarounds() {
        let device = test_device!(Gen7, 2);
        let single = Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();

        let mut create_info = triangle_pipeline_info!();
        create_info.multisample_state.rasterization_samples = SampleCount::Sample4;
        let multi = Pipeline::new_graphics(device, create_info).unwrap();

        assert_ne!(single.workarounds(), multi.workarounds());

        let delta = PipelineDelta::new(&single, &multi).unwrap();
        assert!(!delta.is_empty());
        assert!(delta
            .packets()
            .iter()
            .any(|packet| packet.kind() == PacketKind::PostBindWorkaround));
        assert_switches(&single, &multi);
        assert_switches(&multi, &single);
    }

    #[test]
    fn graphics_to_compute() {
        let device = test_device!(Gen7_5, 0);
        let graphics = Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();
        let compute =
            Pipeline::new_compute(device, ComputePipelineCreateInfo::new(compute_stage!()))
                .unwrap();

        let delta = PipelineDelta::new(&graphics, &compute).unwrap();
        assert_eq!(delta.commands().words(), compute.commands().words());
    }

    #[test]
    fn device_mismatch() {
        let a = Pipeline::new_graphics(test_device!(), triangle_pipeline_info!()).unwrap();
        let b = Pipeline::new_graphics(test_device!(), triangle_pipeline_info!()).unwrap();

        assert_eq!(
            PipelineDelta::new(&a, &b).unwrap_err(),
            PipelineDeltaError::DeviceMismatch,
        );
    }
}
