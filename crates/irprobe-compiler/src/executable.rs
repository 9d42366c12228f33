use irprobe_ir::HloModule;
use irprobe_ir::proto::HloProto;

use crate::buffer::BufferAssignment;

/// An optimized, device-targeted program.
#[derive(Debug, Clone)]
pub struct LocalExecutable {
    module: HloModule,
    buffer_assignment: BufferAssignment,
    hlo_proto: Option<HloProto>,
    device_ordinal: i32,
}

impl LocalExecutable {
    pub(crate) fn new(
        module: HloModule,
        buffer_assignment: BufferAssignment,
        hlo_proto: Option<HloProto>,
        device_ordinal: i32,
    ) -> Self {
        Self {
            module,
            buffer_assignment,
            hlo_proto,
            device_ordinal,
        }
    }

    /// The optimized module.
    pub fn module(&self) -> &HloModule {
        &self.module
    }

    pub fn buffer_assignment(&self) -> &BufferAssignment {
        &self.buffer_assignment
    }

    /// The embedded module and buffer assignment, present only when the
    /// executable was built with IR embedding.
    pub fn hlo_proto(&self) -> Option<&HloProto> {
        self.hlo_proto.as_ref()
    }

    pub fn device_ordinal(&self) -> i32 {
        self.device_ordinal
    }

    pub fn replica_count(&self) -> u32 {
        self.module.config.replica_count
    }
}
