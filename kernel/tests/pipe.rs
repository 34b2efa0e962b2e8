mod common;

use std::cell::RefCell;
use std::rc::Rc;

use kernel::Error;

use common::{read_all, run_init};

#[test]
fn reader_blocks_until_writer_runs() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let events = log.clone();
    let status = run_init(move |sys| async move {
        let [rfd, wfd] = sys.pipe().unwrap();
        let child_events = events.clone();
        let child = sys
            .fork(move |sys| async move {
                sys.close(rfd).unwrap();
                child_events.borrow_mut().push("write");
                assert_eq!(sys.write(wfd, b"hello from pipe").await, Ok(15));
                child_events.borrow_mut().push("wrote");
                0
            })
            .unwrap();
        sys.close(wfd).unwrap();

        events.borrow_mut().push("read");
        let mut buf = [0; 16];
        assert_eq!(sys.read(rfd, &mut buf).await, Ok(15));
        assert_eq!(&buf[..15], b"hello from pipe");
        events.borrow_mut().push("got");

        assert_eq!(sys.wait().await, Ok((child, 0)));
        // 写端全部关闭后读到文件末尾
        assert_eq!(sys.read(rfd, &mut buf).await, Ok(0));
        sys.close(rfd).unwrap();
        0
    });
    assert_eq!(status, 0);
    assert_eq!(*log.borrow(), ["read", "write", "wrote", "got"]);
}

#[test]
fn writer_blocks_on_full_ring() {
    let status = run_init(|sys| async move {
        let [rfd, wfd] = sys.pipe().unwrap();
        let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();
        let child = sys
            .fork(move |sys| async move {
                sys.close(rfd).unwrap();
                assert_eq!(sys.write(wfd, &data).await, Ok(data.len()));
                sys.close(wfd).unwrap();
                0
            })
            .unwrap();
        sys.close(wfd).unwrap();

        assert_eq!(read_all(&sys, rfd).await, expected);
        sys.close(rfd).unwrap();
        assert_eq!(sys.wait().await, Ok((child, 0)));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn writing_with_no_reader_is_broken() {
    let status = run_init(|sys| async move {
        let [rfd, wfd] = sys.pipe().unwrap();
        sys.close(rfd).unwrap();
        assert_eq!(sys.write(wfd, b"x").await, Err(Error::BrokenPipe));
        assert_eq!(sys.errno(), Some(Error::BrokenPipe));
        sys.close(wfd).unwrap();
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn blocked_writer_fails_when_reader_exits() {
    let status = run_init(|sys| async move {
        let [rfd, wfd] = sys.pipe().unwrap();
        let reader = sys
            .fork(move |sys| async move {
                sys.close(wfd).unwrap();
                let mut buf = [0; 8];
                assert_eq!(sys.read(rfd, &mut buf).await, Ok(8));
                // 读一次就走，留下满的管道
                0
            })
            .unwrap();
        sys.close(rfd).unwrap();

        let data = [b'p'; 100];
        assert_eq!(sys.write(wfd, &data).await, Err(Error::BrokenPipe));
        assert_eq!(sys.wait().await, Ok((reader, 0)));
        sys.close(wfd).unwrap();
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn pipes_are_stat_less_and_unseekable() {
    let status = run_init(|sys| async move {
        let [rfd, wfd] = sys.pipe().unwrap();
        assert_eq!(sys.fstat(rfd), Err(Error::InvalidArgument));
        assert_eq!(
            sys.lseek(wfd, 0, kernel::Whence::Set),
            Err(Error::IllegalSeek)
        );
        let mut buf = [0; 1];
        assert_eq!(sys.read(wfd, &mut buf).await, Err(Error::BadDescriptor));
        assert_eq!(sys.write(rfd, b"x").await, Err(Error::BadDescriptor));
        sys.close(rfd).unwrap();
        sys.close(wfd).unwrap();
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn pipe_pool_exhaustion_is_recoverable() {
    let status = run_init(|sys| async move {
        let mut fds = Vec::new();
        // 系统打开文件表有 16 项，控制台占了 3 项
        loop {
            match sys.pipe() {
                Ok(pair) => fds.extend(pair),
                Err(err) => {
                    assert_eq!(err, Error::FileTableOverflow);
                    break;
                }
            }
        }
        assert_eq!(fds.len(), 12);
        for fd in fds {
            sys.close(fd).unwrap();
        }
        assert!(sys.pipe().is_ok());
        0
    });
    assert_eq!(status, 0);
}
