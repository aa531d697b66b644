use crate::renderer::device::GraphicsDevice;

/// A unit of work that needs the graphics device.
pub type RenderTask = Box<dyn FnOnce(&mut dyn GraphicsDevice) + Send + 'static>;

/// Marshals work onto the render thread.
///
/// Any thread may [`begin_invoke`](Self::begin_invoke); the render thread
/// drains the queue once per frame with
/// [`process_pending`](Self::process_pending). Tasks run in submission order.
#[derive(Clone)]
pub struct RenderDispatcher {
    sender: flume::Sender<RenderTask>,
    receiver: flume::Receiver<RenderTask>,
}

impl RenderDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }

    pub fn begin_invoke<F>(&self, task: F)
    where
        F: FnOnce(&mut dyn GraphicsDevice) + Send + 'static,
    {
        if let Err(e) = self.sender.send(Box::new(task)) {
            log::error!("Failed to queue render task: {e}. Receiver disconnected.");
        }
    }

    /// Runs the tasks queued before this call and returns how many ran.
    ///
    /// Tasks queued by a running task wait for the next call.
    pub fn process_pending(&self, device: &mut dyn GraphicsDevice) -> usize {
        let queued = self.receiver.len();
        let mut ran = 0;
        while ran < queued {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task(device);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        if ran > 0 {
            log::trace!("Processed {} render tasks", ran);
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for RenderDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::{BufferDescriptor, BufferUsage};
    use crate::renderer::headless::HeadlessDevice;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tasks_run_in_submission_order() {
        let dispatcher = RenderDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            dispatcher.begin_invoke(move |_| order.lock().unwrap().push(i));
        }
        assert_eq!(dispatcher.pending(), 3);

        let mut device = HeadlessDevice::new();
        assert_eq!(dispatcher.process_pending(&mut device), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn tasks_from_other_threads_reach_the_device() {
        let dispatcher = RenderDispatcher::new();
        let worker = dispatcher.clone();
        std::thread::spawn(move || {
            worker.begin_invoke(|device| {
                device
                    .create_buffer(&BufferDescriptor {
                        label: "Queued",
                        usage: BufferUsage::Vertex,
                        contents: &[0u8; 16],
                    })
                    .unwrap();
            });
        })
        .join()
        .unwrap();

        let mut device = HeadlessDevice::new();
        dispatcher.process_pending(&mut device);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn nested_tasks_wait_for_next_drain() {
        let dispatcher = RenderDispatcher::new();
        let inner = dispatcher.clone();
        dispatcher.begin_invoke(move |_| inner.begin_invoke(|_| {}));

        let mut device = HeadlessDevice::new();
        assert_eq!(dispatcher.process_pending(&mut device), 1);
        assert_eq!(dispatcher.pending(), 1);
    }
}
