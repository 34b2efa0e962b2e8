//! 可执行映像与 exec
//!
//! 映像文件以`#!<程序名>\n`开头，程序名在 [`ProgramTable`] 中登记为原生入口。
//! exec 把整个映像装入进程的页中，在栈顶下方布置参数区：
//!
//! ```text
//! base                                                      STACKTOP
//! | argv | argv[0] .. argv[argc-1] | NULL | "arg0\0" "arg1\0" ... |
//! ```
//!
//! 指针都是大端序的 16 位地址，`argv`指向紧随其后的指针数组。

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::future::Future;

use vfs::{Error, InodeType};
use xv6fs::InodeRef;

use super::ProcFuture;
use crate::config::{ARG_MAX, STACKTOP, USERCODE, USERDATA};
use crate::machine::Kernel;
use crate::memory::{AddressSpace, FrameAllocator};
use crate::syscall::Sys;

type Program = Rc<dyn Fn(Sys, Vec<String>) -> ProcFuture>;

/// 程序名到原生入口的映射
#[derive(Clone, Default)]
pub struct ProgramTable {
    programs: BTreeMap<String, Program>,
}

impl ProgramTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &str, main: F) -> &mut Self
    where
        F: Fn(Sys, Vec<String>) -> Fut + 'static,
        Fut: Future<Output = i32> + 'static,
    {
        self.programs.insert(
            name.to_string(),
            Rc::new(move |sys: Sys, argv: Vec<String>| Box::pin(main(sys, argv)) as ProcFuture),
        );
        self
    }

    fn get(&self, name: &str) -> Option<Program> {
        self.programs.get(name).cloned()
    }

    /// 运行`name`的映像文件内容
    pub fn image(name: &str) -> Vec<u8> {
        alloc::format!("#!{name}\n").into_bytes()
    }
}

/// 解析映像的文件头，得到程序名
fn interpreter(image: &[u8]) -> Option<&str> {
    let rest = image.strip_prefix(b"#!")?;
    let end = rest.iter().position(|&b| b == b'\n')?;
    core::str::from_utf8(&rest[..end]).ok()
}

/// 布置好的参数区
struct ArgBlock {
    bytes: Vec<u8>,
}

impl ArgBlock {
    fn stage(argv: &[&str]) -> Result<Self, Error> {
        let ptrs = 2 + (argv.len() + 1) * 2;
        let memsize = ptrs + argv.iter().map(|arg| arg.len() + 1).sum::<usize>();
        if memsize >= ARG_MAX {
            return Err(Error::ArgumentListTooLong);
        }
        if argv.iter().any(|arg| arg.contains('\0')) {
            return Err(Error::InvalidArgument);
        }

        let base = STACKTOP - memsize as u16;
        let mut bytes = vec![0; memsize];
        bytes[..2].copy_from_slice(&(base + 2).to_be_bytes());
        let mut off = ptrs;
        for (i, arg) in argv.iter().enumerate() {
            let ptr = base + off as u16;
            bytes[2 + 2 * i..4 + 2 * i].copy_from_slice(&ptr.to_be_bytes());
            bytes[off..off + arg.len()].copy_from_slice(arg.as_bytes());
            off += arg.len() + 1;
        }
        Ok(Self { bytes })
    }

    /// 参数区的起始地址，也是新的栈指针
    fn base(&self) -> u16 {
        STACKTOP - self.bytes.len() as u16
    }
}

/// 从用户内存中读回参数
fn read_args(space: &AddressSpace<'_>, sp: u16) -> Result<Vec<String>, Error> {
    let argv = space.read_u16(sp)?;
    let mut args = Vec::new();
    loop {
        let ptr = space.read_u16(argv + 2 * args.len() as u16)?;
        if ptr == 0 {
            return Ok(args);
        }
        let arg = space.read_cstr(ptr, ARG_MAX)?;
        args.push(String::from_utf8_lossy(&arg).into_owned());
    }
}

impl Kernel {
    /// 以`path`处的映像替换当前进程
    ///
    /// 一旦开始改动进程的内存就不再失败。
    pub(crate) fn exec(&mut self, path: &str, argv: &[&str]) -> Result<(), Error> {
        let args = ArgBlock::stage(argv)?;
        let slot = self.current_slot();
        let cwd = self.cwd(slot);

        let ip = self.fs.namei(path.as_bytes(), cwd).ok_or(Error::NotFound)?;
        self.fs.ilock(ip);
        let loaded = self.load(slot, ip, &args);
        self.fs.iput(ip);
        let program = loaded?;

        let space = AddressSpace::new(&self.procs[slot].frames, &mut self.memory);
        let args = read_args(&space, args.base())?;

        let name = path.rsplit('/').next().unwrap_or(path);
        log::info!("exec {path} as pid {} with {args:?}", self.procs[slot].pid);
        let p = &mut self.procs[slot];
        p.name = name.to_string();
        p.entry = Some(Box::new(move |sys: Sys| program(sys, args)));
        p.reload = true;
        Ok(())
    }

    fn load(&mut self, slot: usize, ip: InodeRef, args: &ArgBlock) -> Result<Program, Error> {
        let inode = self.fs.inode(ip);
        if inode.kind() != InodeType::File {
            return Err(Error::ExecFormat);
        }
        let size = inode.size() as usize;
        if USERCODE as usize + size > args.base() as usize {
            return Err(Error::OutOfMemory);
        }

        let mut image = vec![0; size];
        self.fs.readi(ip, &mut image, 0)?;
        let program = interpreter(&image)
            .and_then(|name| self.programs.get(name))
            .ok_or(Error::ExecFormat)?;
        let Some(spare) = self.alloc_frame() else {
            return Err(Error::OutOfMemory);
        };

        // 第 0 页先装入备用帧，再换下旧帧
        let split = size.min((USERDATA - USERCODE) as usize);
        let code = USERCODE as usize;
        self.memory.frame_mut(spare)[code..code + split].copy_from_slice(&image[..split]);
        let p = &mut self.procs[slot];
        let old = p.frames[0].replace(spare);
        if let Some(old) = old {
            self.frames.dealloc(old);
        }

        let mut space = AddressSpace::new(&p.frames, &mut self.memory);
        space.write(USERDATA, &image[split..])?;
        space.write(args.base(), &args.bytes)?;

        if self.cpu.current == Some(slot) {
            self.cpu.mmu = p.frames;
            self.cpu.sp = args.base();
        }
        p.usersp = args.base();
        Ok(program)
    }

    pub(crate) fn cwd(&self, slot: usize) -> InodeRef {
        match self.procs[slot].cwd {
            Some(cwd) => cwd,
            None => panic!("pid {} has no working directory", self.procs[slot].pid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FrameNo, PhysMemory};

    #[test]
    fn header_names_the_program() {
        assert_eq!(interpreter(b"#!echo\nrest"), Some("echo"));
        assert_eq!(interpreter(&ProgramTable::image("sh")), Some("sh"));
        assert_eq!(interpreter(b"#!echo"), None);
        assert_eq!(interpreter(b"\x7fELF"), None);
    }

    #[test]
    fn args_are_staged_below_the_stack_top() {
        let args = ArgBlock::stage(&["echo", "hi"]).unwrap();
        // argv、3 个指针、"echo\0hi\0"
        assert_eq!(args.bytes.len(), 2 + 6 + 8);
        let base = args.base();
        assert_eq!(base, STACKTOP - 16);
        assert_eq!(&args.bytes[..2], &(base + 2).to_be_bytes());
        assert_eq!(&args.bytes[2..4], &(base + 8).to_be_bytes());
        assert_eq!(&args.bytes[4..6], &(base + 13).to_be_bytes());
        assert_eq!(&args.bytes[6..8], &[0, 0]);
        assert_eq!(&args.bytes[8..], b"echo\0hi\0");

        let mut memory = PhysMemory::new(2);
        let mut table = [None; crate::config::NPAGES];
        table[7] = Some(FrameNo::from(1u8));
        let mut space = AddressSpace::new(&table, &mut memory);
        space.write(base, &args.bytes).unwrap();
        assert_eq!(read_args(&space, base).unwrap(), ["echo", "hi"]);
    }

    #[test]
    fn oversized_argument_lists_are_rejected() {
        let long = "x".repeat(ARG_MAX);
        assert_eq!(
            ArgBlock::stage(&[long.as_str()]).err(),
            Some(Error::ArgumentListTooLong)
        );
        assert!(ArgBlock::stage(&[]).is_ok());
    }
}
